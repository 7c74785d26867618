//! Ingest command implementation

use super::Engine;
use crate::output;
use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use timestrata_aggregator::ingest::replay_records;
use timestrata_aggregator::metrics::encode_metrics;
use timestrata_aggregator::registry::VariableRegistry;
use timestrata_shared::utils::time::format_timestamp;
use tracing::debug;

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// JSON-lines file, one `{"timestamp": .., "values": {..}}` per line
    pub file: PathBuf,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    pub metrics: bool,

    /// Print the last value of each variable as JSON series
    #[arg(long)]
    pub current: bool,
}

/// Display name and formatted last value of every variable.
pub fn latest_values(registry: &VariableRegistry) -> Result<Vec<(String, String)>> {
    registry
        .variables()
        .iter()
        .map(|v| -> Result<(String, String)> {
            Ok((v.style().display_name.clone(), v.formatted()?))
        })
        .collect()
}

pub fn run(config: Option<&Path>, args: IngestArgs) -> Result<()> {
    let engine = Engine::open(config)?;
    debug!("Replaying {}", args.file.display());
    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    let bar = output::progress(0, "Replaying");
    let report = replay_records(BufReader::new(file), &engine.registry, &engine.tiers, |n| {
        bar.set_message(format!("Replayed {} records", n));
        bar.tick();
    })
    .context("Replay failed")?;
    bar.finish_and_clear();

    match (report.first_timestamp, report.last_timestamp) {
        (Some(first), Some(last)) => output::success(&format!(
            "{} records from {} to {}, {} tier rows written",
            report.records,
            format_timestamp(first),
            format_timestamp(last),
            report.flushes
        )),
        _ => output::info("No records in input"),
    }
    if report.unknown_variables > 0 {
        output::warning(&format!(
            "{} values for unknown variables were skipped",
            report.unknown_variables
        ));
    }

    if args.current {
        println!("{}", serde_json::to_string_pretty(&engine.registry.current_points()?)?);
    } else {
        for (name, value) in latest_values(&engine.registry)? {
            println!("  {:<24} {}", name, value);
        }
    }

    if args.metrics {
        print!("{}", encode_metrics());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestrata_aggregator::config::VariableSpec;
    use timestrata_shared::{Domain, ScalarValue};

    #[test]
    fn test_latest_values() {
        let mut registry = VariableRegistry::new();
        let mut temp = VariableSpec::new("indoor_temp", Domain::Real);
        temp.display_name = Some("Indoor".to_string());
        temp.precision = Some(1);
        temp.unit = Some(" C".to_string());
        registry.register(&temp).unwrap();
        registry
            .register(&VariableSpec::new("humidity", Domain::Real))
            .unwrap();
        registry
            .update("indoor_temp", ScalarValue::Real(21.46), 5.0)
            .unwrap();

        assert_eq!(
            latest_values(&registry).unwrap(),
            vec![
                ("Indoor".to_string(), "21.5 C".to_string()),
                ("humidity".to_string(), "No value".to_string()),
            ]
        );
    }
}
