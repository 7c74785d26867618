//! Subcommands

pub mod ingest;
pub mod query;
pub mod rebuild;
pub mod schema;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use timestrata_aggregator::config::EngineConfig;
use timestrata_aggregator::registry::{VariableRegistry, VariableSource};
use timestrata_aggregator::storage::{self, TierStore};
use timestrata_aggregator::tier_set::TierSet;
use timestrata_shared::utils::time::system_time_secs_f64;
use tracing::debug;

/// Everything a command needs, opened from one configuration.
pub struct Engine {
    pub config: EngineConfig,
    pub store: Arc<dyn TierStore>,
    pub registry: VariableRegistry,
    pub tiers: TierSet,
}

impl Engine {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = EngineConfig::load(config_path).context("Failed to load configuration")?;
        let store = storage::open(&config.storage).context("Failed to open storage")?;
        let sources: [&dyn VariableSource; 1] = [&config];
        let registry =
            VariableRegistry::from_sources(&sources).context("Invalid variable definitions")?;
        let tiers = TierSet::open(
            store.clone(),
            &config.tiers,
            registry.descriptors(),
            system_time_secs_f64(),
        )
        .context("Failed to open tiers")?;
        debug!(
            "Opened {} tiers with {} variables",
            tiers.tiers().len(),
            registry.len()
        );
        Ok(Self {
            config,
            store,
            registry,
            tiers,
        })
    }
}

/// Format an optional retention period for display.
pub fn describe_keep(keep: Option<f64>) -> String {
    match keep {
        Some(secs) => describe_secs(secs),
        None => "unlimited".to_string(),
    }
}

pub fn describe_secs(secs: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(604_800.0, "w"), (86_400.0, "d"), (3_600.0, "h"), (60.0, "m")];
    for (size, suffix) in UNITS {
        if secs >= size && (secs / size).fract() == 0.0 {
            return format!("{}{}", secs / size, suffix);
        }
    }
    format!("{}s", secs)
}
