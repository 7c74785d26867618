//! Engine configuration
//!
//! Loaded from an optional TOML file, then overridden by `TIMESTRATA_*`
//! environment variables (`__` separates nested keys, e.g.
//! `TIMESTRATA_STORAGE__PATH`).

use crate::error::{EngineError, Result};
use crate::registry::{ValueFormat, VariableSource};
use crate::storage::sqlite::SyncMode;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use timestrata_shared::utils::{is_valid_identifier, parse_duration_secs};
use timestrata_shared::{AggregationMode, Domain, VariableDescriptor};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Storage backend configuration
    pub storage: StorageConfig,

    /// Ingestion tick interval in milliseconds
    pub tick_ms: u64,

    /// Retention tiers, any order
    pub tiers: Vec<TierSpec>,

    /// Recorded variables, in column order
    pub variables: Vec<VariableSpec>,

    /// Default per-tier point budget for historical queries
    pub history_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageConfig {
    Sqlite {
        path: PathBuf,
        #[serde(default)]
        synchronous: SyncMode,
    },
    InMemory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: std::env::var("TIMESTRATA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("timestrata.db")),
            synchronous: SyncMode::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            tick_ms: std::env::var("TIMESTRATA_TICK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            tiers: default_tiers(),
            variables: Vec::new(),
            history_points: 1000,
        }
    }
}

/// 1s rows for a week, 1m rows for a month, 1h rows forever.
pub fn default_tiers() -> Vec<TierSpec> {
    vec![
        TierSpec::new("data1s", 1.0, Some(7.0 * 86_400.0)),
        TierSpec::new("data1m", 60.0, Some(30.0 * 86_400.0)),
        TierSpec::new("data1h", 3_600.0, None),
    ]
}

/// One retention tier. Periods are seconds; in files they may also be
/// written as `"30s"`, `"5m"`, `"7d"`, and `keep_period` as `"unlimited"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierSpec {
    pub name: String,
    #[serde(deserialize_with = "de_period")]
    pub store_period: f64,
    #[serde(default, deserialize_with = "de_keep_period")]
    pub keep_period: Option<f64>,
}

impl TierSpec {
    pub fn new(name: impl Into<String>, store_period: f64, keep_period: Option<f64>) -> Self {
        Self {
            name: name.into(),
            store_period,
            keep_period,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PeriodRepr {
    Seconds(f64),
    Text(String),
}

fn de_period<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    match PeriodRepr::deserialize(d)? {
        PeriodRepr::Seconds(s) => Ok(s),
        PeriodRepr::Text(t) => parse_duration_secs(&t).map_err(serde::de::Error::custom),
    }
}

fn de_keep_period<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<PeriodRepr>::deserialize(d)? {
        None => Ok(None),
        Some(PeriodRepr::Seconds(s)) => Ok(Some(s)),
        Some(PeriodRepr::Text(t)) => match t.trim().to_lowercase().as_str() {
            "" | "unlimited" | "none" | "forever" => Ok(None),
            _ => parse_duration_secs(&t)
                .map(Some)
                .map_err(serde::de::Error::custom),
        },
    }
}

/// A recorded variable as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: Domain,
    /// Overrides the domain's default mode (`mean` or `majority`)
    #[serde(default)]
    pub aggregation: Option<String>,
    /// Decimal places when formatting the current value
    #[serde(default)]
    pub precision: Option<usize>,
    #[serde(default)]
    pub unit: Option<String>,
}

fn default_domain() -> Domain {
    Domain::Real
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, domain: Domain) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            domain,
            aggregation: None,
            precision: None,
            unit: None,
        }
    }

    pub fn to_descriptor(&self) -> Result<VariableDescriptor> {
        let descriptor = VariableDescriptor::new(&self.name, self.domain.clone())?;
        match &self.aggregation {
            Some(mode) => {
                let mode: AggregationMode = mode.parse()?;
                Ok(descriptor.with_mode(mode)?)
            }
            None => Ok(descriptor),
        }
    }

    pub fn format(&self) -> ValueFormat {
        ValueFormat {
            precision: self.precision,
            unit: self.unit.clone(),
        }
    }
}

impl VariableSource for EngineConfig {
    fn append_variables(&self, out: &mut Vec<VariableSpec>) {
        out.extend(self.variables.iter().cloned());
    }
}

impl EngineConfig {
    /// Load from `path` (if given) plus environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TIMESTRATA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: EngineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could only fail later at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(EngineError::Config("tick_ms must be positive".into()));
        }
        if self.tiers.is_empty() {
            return Err(EngineError::Config("at least one tier is required".into()));
        }

        let mut tier_names = HashSet::new();
        for tier in &self.tiers {
            if !is_valid_identifier(&tier.name) {
                return Err(EngineError::InvalidTableName(tier.name.clone()));
            }
            if !tier_names.insert(tier.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate tier name: {}",
                    tier.name
                )));
            }
            if !(tier.store_period > 0.0) || !tier.store_period.is_finite() {
                return Err(EngineError::Config(format!(
                    "tier {}: store_period must be a positive number of seconds",
                    tier.name
                )));
            }
            if let Some(keep) = tier.keep_period {
                if !(keep > 0.0) {
                    return Err(EngineError::Config(format!(
                        "tier {}: keep_period must be positive or unlimited",
                        tier.name
                    )));
                }
            }
        }

        let mut variable_names = HashSet::new();
        for variable in &self.variables {
            variable.to_descriptor()?;
            if !variable_names.insert(variable.name.as_str()) {
                return Err(EngineError::DuplicateVariable(variable.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_tiers_valid() {
        let config = EngineConfig {
            storage: StorageConfig::InMemory,
            ..EngineConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.tiers[2].keep_period, None);
    }

    #[test]
    fn test_load_toml_with_duration_strings() {
        let file = write_config(
            r#"
tick_ms = 500

[storage]
type = "in_memory"

[[tiers]]
name = "fine"
store_period = "1s"
keep_period = "30s"

[[tiers]]
name = "coarse"
store_period = 60
keep_period = "unlimited"

[[variables]]
name = "indoor_temp"
unit = "C"
precision = 1

[[variables]]
name = "pump_mode"
domain = { type = "enumerated", labels = ["off", "on"] }
"#,
        );
        let config = EngineConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.tick_ms, 500);
        assert_eq!(config.storage, StorageConfig::InMemory);
        assert_eq!(config.tiers[0], TierSpec::new("fine", 1.0, Some(30.0)));
        assert_eq!(config.tiers[1], TierSpec::new("coarse", 60.0, None));
        assert_eq!(
            config.variables[1].to_descriptor().unwrap().aggregation_mode(),
            AggregationMode::TimeWeightedMajority
        );
    }

    #[test]
    fn test_mean_over_enumerated_rejected() {
        let mut config = EngineConfig {
            storage: StorageConfig::InMemory,
            ..EngineConfig::default()
        };
        let mut spec = VariableSpec::new(
            "pump_mode",
            Domain::Enumerated {
                labels: vec!["off".into(), "on".into()],
            },
        );
        spec.aggregation = Some("mean".into());
        config.variables.push(spec);
        assert!(matches!(config.validate(), Err(EngineError::Variable(_))));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let mut spec = VariableSpec::new("t", Domain::Real);
        spec.aggregation = Some("median".into());
        assert!(spec.to_descriptor().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = EngineConfig {
            storage: StorageConfig::InMemory,
            ..EngineConfig::default()
        };
        config.tiers.push(TierSpec::new("data1s", 5.0, None));
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));

        config.tiers = default_tiers();
        config.variables.push(VariableSpec::new("t", Domain::Real));
        config.variables.push(VariableSpec::new("t", Domain::Integer));
        assert!(matches!(
            config.validate(),
            Err(EngineError::DuplicateVariable(_))
        ));
    }

    #[test]
    fn test_invalid_tier_period_rejected() {
        let mut config = EngineConfig {
            storage: StorageConfig::InMemory,
            ..EngineConfig::default()
        };
        config.tiers = vec![TierSpec::new("t", 0.0, None)];
        assert!(config.validate().is_err());
        config.tiers = vec![TierSpec::new("bad name", 1.0, None)];
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidTableName(_))
        ));
    }
}
