//! Offline rebuild of every tier from the finest tier's rows
//!
//! Used after tier definitions change: all rows of the source tier are read,
//! every tier is cleared, and the rows are replayed one second apart so the
//! coarser tiers are recomputed. The engine must not be ingesting live data
//! while this runs.

use crate::audit;
use crate::error::Result;
use crate::tier_set::TierSet;
use serde::Serialize;
use tracing::info;

/// Rows replayed between commits.
pub const COMMIT_EVERY: usize = 1000;

/// Spacing of replayed rows, seconds.
pub const REPLAY_STEP_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub source_tier: String,
    pub source_rows: usize,
    pub cleared_rows: usize,
    pub flushes: usize,
    /// Simulated time of the first replayed row
    pub replay_start: f64,
}

/// Rebuild all tiers of `tiers` from `source_tier`, ending the replay at
/// `now`. `progress` is called with `(replayed, total)` after every commit.
pub fn rebuild(
    tiers: &TierSet,
    source_tier: &str,
    now: f64,
    mut progress: impl FnMut(usize, usize),
) -> Result<RebuildReport> {
    let source = tiers.tier(source_tier)?;
    let rows = source.read_all_rows()?;
    let total = rows.len();
    info!("Rebuild: {} rows found in {}", total, source_tier);

    let cleared_rows = tiers.clear_all()?;

    let replay_start = now - total as f64 * REPLAY_STEP_SECS;
    tiers.reset_clocks(replay_start)?;

    let mut flushes = 0;
    for (i, row) in rows.iter().enumerate() {
        let at = replay_start + (i + 1) as f64 * REPLAY_STEP_SECS;
        flushes += tiers.ingest(&row.values, at, false)?;

        let replayed = i + 1;
        if replayed % COMMIT_EVERY == 0 {
            tiers.commit_all()?;
            audit::rebuild_progress(source_tier, replayed, total);
            progress(replayed, total);
        }
    }
    tiers.commit_all()?;
    progress(total, total);
    audit::rebuild_progress(source_tier, total, total);

    Ok(RebuildReport {
        source_tier: source_tier.to_string(),
        source_rows: total,
        cleared_rows,
        flushes,
        replay_start,
    })
}
