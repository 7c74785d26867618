//! Rebuild command implementation

use super::Engine;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use timestrata_aggregator::rebuild::rebuild;
use timestrata_shared::utils::time::system_time_secs_f64;

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Tier whose rows are replayed (default: the finest tier)
    #[arg(short, long)]
    pub source: Option<String>,

    /// Confirm deleting every row of every tier before the replay
    #[arg(long)]
    pub yes: bool,
}

pub fn run(config: Option<&Path>, args: RebuildArgs) -> Result<()> {
    let engine = Engine::open(config)?;
    let source = match args.source {
        Some(name) => name,
        None => engine
            .tiers
            .tiers()
            .first()
            .map(|t| t.name().to_string())
            .context("No tiers configured")?,
    };
    let rows = engine.tiers.tier(&source)?.read_all_rows()?.len();

    if !args.yes {
        output::warning(&format!(
            "This clears all {} tiers and replays {} rows from {}. Re-run with --yes to proceed.",
            engine.tiers.tiers().len(),
            rows,
            source
        ));
        return Ok(());
    }

    let bar = output::progress(rows as u64, "Rebuilding");
    let report = rebuild(&engine.tiers, &source, system_time_secs_f64(), |done, _| {
        bar.set_position(done as u64);
    })
    .context("Rebuild failed")?;
    bar.finish_and_clear();

    output::success(&format!(
        "Replayed {} rows from {} ({} cleared, {} tier rows written)",
        report.source_rows, report.source_tier, report.cleared_rows, report.flushes
    ));
    Ok(())
}
