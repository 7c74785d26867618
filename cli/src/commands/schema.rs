//! Schema command implementation

use super::{describe_keep, describe_secs, Engine};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct TierInfo {
    name: String,
    store_period: f64,
    keep_period: Option<f64>,
    columns: Vec<String>,
    /// Persisted columns no configured variable maps to
    orphaned: Vec<String>,
}

#[derive(Serialize)]
struct VariableInfo {
    name: String,
    display_name: String,
    domain: &'static str,
    aggregation: String,
    colour: &'static str,
}

#[derive(Serialize)]
struct SchemaReport {
    tiers: Vec<TierInfo>,
    variables: Vec<VariableInfo>,
}

pub fn run(config: Option<&Path>, args: SchemaArgs) -> Result<()> {
    let engine = Engine::open(config)?;

    let mut tiers = Vec::new();
    for tier in engine.tiers.tiers() {
        let columns = engine.store.table_columns(tier.name())?;
        let expected: Vec<&str> = tier.schema().columns().iter().map(|c| c.name.as_str()).collect();
        let orphaned = columns
            .iter()
            .filter(|c| !expected.contains(&c.as_str()))
            .cloned()
            .collect();
        tiers.push(TierInfo {
            name: tier.name().to_string(),
            store_period: tier.store_period(),
            keep_period: tier.keep_period(),
            columns,
            orphaned,
        });
    }

    let variables: Vec<VariableInfo> = engine
        .registry
        .variables()
        .iter()
        .map(|v| VariableInfo {
            name: v.descriptor().name().to_string(),
            display_name: v.style().display_name.clone(),
            domain: v.descriptor().domain().kind(),
            aggregation: v.descriptor().aggregation_mode().to_string(),
            colour: v.style().colour,
        })
        .collect();
    debug!("Inspected {} tiers, {} variables", tiers.len(), variables.len());

    let report = SchemaReport { tiers, variables };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for info in &report.tiers {
        println!(
            "{}  every {}, keep {}",
            info.name.bold(),
            describe_secs(info.store_period),
            describe_keep(info.keep_period)
        );
        for column in &info.columns {
            if info.orphaned.contains(column) {
                println!("    {} {}", column, "(unused)".dimmed());
            } else {
                println!("    {}", column);
            }
        }
    }

    println!();
    for v in &report.variables {
        println!(
            "{:<24} {:<11} {:<24} {:<20} {}",
            v.name, v.domain, v.aggregation, v.colour, v.display_name
        );
    }
    Ok(())
}
