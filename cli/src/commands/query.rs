//! Query command implementation

use super::Engine;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use timestrata_aggregator::history::HistoricalQuery;
use timestrata_shared::utils::time::{format_timestamp, system_time_secs_f64};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Exclusive end of the range, Unix seconds (default: now)
    #[arg(short, long)]
    pub end: Option<f64>,

    /// Max rows per tier (default: history_points from config)
    #[arg(short, long)]
    pub points: Option<usize>,

    /// Only print these variables
    #[arg(long = "var")]
    pub variables: Vec<String>,

    /// Print a summary instead of JSON
    #[arg(long)]
    pub summary: bool,

    /// Single-line JSON
    #[arg(long)]
    pub compact: bool,
}

pub fn run(config: Option<&Path>, args: QueryArgs) -> Result<()> {
    let engine = Engine::open(config)?;
    let query = HistoricalQuery {
        max_points_per_tier: args.points.unwrap_or(engine.config.history_points),
        end_time: args.end.unwrap_or_else(system_time_secs_f64),
    };
    let mut result = engine.tiers.history(&query).context("History query failed")?;

    if !args.variables.is_empty() {
        for name in &args.variables {
            if !result.series.iter().any(|s| s.variable == *name) {
                output::warning(&format!("Unknown variable: {}", name));
            }
        }
        result
            .series
            .retain(|s| args.variables.iter().any(|v| *v == s.variable));
    }

    if !args.summary {
        let json = if args.compact {
            serde_json::to_string(&result)?
        } else {
            serde_json::to_string_pretty(&result)?
        };
        println!("{}", json);
        return Ok(());
    }

    for c in &result.coverage {
        output::info(&format!(
            "{}: {} rows before {}",
            c.tier,
            c.rows,
            format_timestamp(c.end_time)
        ));
    }
    for series in &result.series {
        match (series.points.first(), series.points.last()) {
            (Some(first), Some(last)) => println!(
                "  {:<24} {:>6} points  {} .. {}  last={}",
                series.variable,
                series.len(),
                format_timestamp(first.timestamp),
                format_timestamp(last.timestamp),
                last.value
            ),
            _ => println!("  {:<24} no data", series.variable),
        }
    }
    Ok(())
}
