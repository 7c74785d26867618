//! Retention lifecycle log.
//!
//! Schema changes, evictions, clears and rebuild progress are emitted via
//! `tracing` with a dedicated target so they can be filtered and formatted
//! (e.g. JSON) separately from routine logs.

use tracing::{info, warn};

pub const RETENTION_TARGET: &str = "timestrata::retention";

/// Tier table created on first start.
pub fn table_created(tier: &str, columns: usize) {
    info!(
        target: RETENTION_TARGET,
        event = "table_created",
        tier = %tier,
        columns = columns,
    );
}

/// A variable column added to an existing tier table.
pub fn column_added(tier: &str, column: &str) {
    info!(
        target: RETENTION_TARGET,
        event = "column_added",
        tier = %tier,
        column = %column,
    );
}

/// Rows dropped for falling outside the retention horizon.
pub fn rows_evicted(tier: &str, count: usize, cutoff_ms: i64) {
    info!(
        target: RETENTION_TARGET,
        event = "rows_evicted",
        tier = %tier,
        count = count,
        cutoff_ms = cutoff_ms,
    );
}

/// Every row of a tier deleted (offline rebuild).
pub fn tier_cleared(tier: &str, count: usize) {
    warn!(
        target: RETENTION_TARGET,
        event = "tier_cleared",
        tier = %tier,
        count = count,
    );
}

pub fn rebuild_progress(source: &str, replayed: usize, total: usize) {
    info!(
        target: RETENTION_TARGET,
        event = "rebuild_progress",
        source = %source,
        replayed = replayed,
        total = total,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_target_is_static() {
        assert_eq!(RETENTION_TARGET, "timestrata::retention");
    }
}
