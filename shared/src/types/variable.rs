//! Variable descriptors
//!
//! A descriptor is the static metadata of one named quantity: its value
//! domain, how it is reduced over a window, and how it is persisted. The name
//! doubles as the column identifier in every tier table, so it is validated
//! once here and never changes afterwards.

use crate::types::value::ScalarValue;
use crate::utils::is_valid_identifier;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column names every tier table carries ahead of the variable columns.
pub const TIMESTAMP_START_COLUMN: &str = "timestamp_start_ms";
pub const TIMESTAMP_END_COLUMN: &str = "timestamp_end_ms";

/// Ordinal reported for enumerated values missing from the label list.
pub const UNKNOWN_ORDINAL: i64 = -1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("invalid variable name {0:?}: must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidName(String),

    #[error("variable name {0:?} collides with a timestamp column")]
    ReservedName(String),

    #[error("enumerated variable {0:?} needs at least one label")]
    EmptyLabels(String),

    #[error("aggregation mode {mode} is not supported for {domain} variable {name:?}")]
    UnsupportedAggregation {
        name: String,
        mode: AggregationMode,
        domain: &'static str,
    },

    #[error("unknown aggregation mode: {0}")]
    UnknownMode(String),
}

/// Value domain of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    Real,
    Integer,
    /// Ordered label list; stored as text, presented as the label's index.
    Enumerated { labels: Vec<String> },
}

impl Domain {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Integer => "integer",
            Self::Enumerated { .. } => "enumerated",
        }
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Real => SqlType::Real,
            Self::Integer => SqlType::Integer,
            Self::Enumerated { .. } => SqlType::Text,
        }
    }

    /// Aggregation used when the configuration does not name one.
    pub fn default_mode(&self) -> AggregationMode {
        match self {
            Self::Enumerated { .. } => AggregationMode::TimeWeightedMajority,
            _ => AggregationMode::TimeWeightedMean,
        }
    }
}

/// Persisted column affinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Real,
    Integer,
    Text,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "REAL",
            Self::Integer => "INTEGER",
            Self::Text => "TEXT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How samples are reduced over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Duration-weighted average.
    #[serde(alias = "mean", alias = "average")]
    TimeWeightedMean,
    /// Value held for the longest total duration.
    #[serde(alias = "majority")]
    TimeWeightedMajority,
}

impl fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeWeightedMean => f.write_str("time_weighted_mean"),
            Self::TimeWeightedMajority => f.write_str("time_weighted_majority"),
        }
    }
}

impl FromStr for AggregationMode {
    type Err = VariableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" | "average" | "time_weighted_mean" => Ok(Self::TimeWeightedMean),
            "majority" | "time_weighted_majority" => Ok(Self::TimeWeightedMajority),
            _ => Err(VariableError::UnknownMode(s.to_string())),
        }
    }
}

/// Static metadata for one named quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    name: String,
    domain: Domain,
    mode: AggregationMode,
}

impl VariableDescriptor {
    /// Create a descriptor with the domain's default aggregation mode.
    pub fn new(name: impl Into<String>, domain: Domain) -> Result<Self, VariableError> {
        let name = name.into();
        if !is_valid_identifier(&name) {
            return Err(VariableError::InvalidName(name));
        }
        if name == TIMESTAMP_START_COLUMN || name == TIMESTAMP_END_COLUMN {
            return Err(VariableError::ReservedName(name));
        }
        if let Domain::Enumerated { labels } = &domain {
            if labels.is_empty() {
                return Err(VariableError::EmptyLabels(name));
            }
        }
        let mode = domain.default_mode();
        Ok(Self { name, domain, mode })
    }

    pub fn real(name: impl Into<String>) -> Result<Self, VariableError> {
        Self::new(name, Domain::Real)
    }

    pub fn integer(name: impl Into<String>) -> Result<Self, VariableError> {
        Self::new(name, Domain::Integer)
    }

    pub fn enumerated<S: Into<String>>(
        name: impl Into<String>,
        labels: impl IntoIterator<Item = S>,
    ) -> Result<Self, VariableError> {
        let labels = labels.into_iter().map(Into::into).collect();
        Self::new(name, Domain::Enumerated { labels })
    }

    /// Override the aggregation mode. Averaging labels is meaningless, so a
    /// mean over an enumerated domain is rejected.
    pub fn with_mode(mut self, mode: AggregationMode) -> Result<Self, VariableError> {
        if mode == AggregationMode::TimeWeightedMean
            && matches!(self.domain, Domain::Enumerated { .. })
        {
            return Err(VariableError::UnsupportedAggregation {
                name: self.name,
                mode,
                domain: "enumerated",
            });
        }
        self.mode = mode;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn aggregation_mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn sql_type(&self) -> SqlType {
        self.domain.sql_type()
    }

    /// Bring an incoming value into this variable's domain.
    ///
    /// Returns `None` when the value cannot be represented: text fed to a
    /// numeric variable, a fractional real fed to an integer one, or a number
    /// fed to an enumerated one.
    pub fn coerce(&self, value: &ScalarValue) -> Option<ScalarValue> {
        match (&self.domain, value) {
            (Domain::Real, v) => v.as_f64().map(ScalarValue::Real),
            (Domain::Integer, ScalarValue::Integer(i)) => Some(ScalarValue::Integer(*i)),
            (Domain::Integer, ScalarValue::Real(r)) => integral(*r).map(ScalarValue::Integer),
            (Domain::Integer, ScalarValue::Text(_)) => None,
            (Domain::Enumerated { .. }, ScalarValue::Text(s)) => {
                Some(ScalarValue::Text(s.clone()))
            }
            (Domain::Enumerated { .. }, _) => None,
        }
    }

    /// Index of an enumerated value in the label list, `-1` when absent.
    pub fn ordinal(&self, value: &ScalarValue) -> i64 {
        match &self.domain {
            Domain::Enumerated { labels } => {
                let text = value.to_string();
                labels
                    .iter()
                    .position(|l| *l == text)
                    .map(|i| i as i64)
                    .unwrap_or(UNKNOWN_ORDINAL)
            }
            _ => UNKNOWN_ORDINAL,
        }
    }

    /// Value as written to a tier row. A window mean over an integer variable
    /// that lands on a whole number is stored as an integer, which is what an
    /// INTEGER column hands back anyway.
    pub fn stored_value(&self, aggregated: ScalarValue) -> ScalarValue {
        match (&self.domain, aggregated) {
            (Domain::Integer, ScalarValue::Real(r)) => match integral(r) {
                Some(i) => ScalarValue::Integer(i),
                None => ScalarValue::Real(r),
            },
            (_, v) => v,
        }
    }

    /// Value as presented in a reconstructed series: enumerated labels become
    /// ordinals, everything else passes through.
    pub fn presentation_value(&self, stored: &ScalarValue) -> ScalarValue {
        match self.domain {
            Domain::Enumerated { .. } => ScalarValue::Integer(self.ordinal(stored)),
            _ => stored.clone(),
        }
    }
}

fn integral(r: f64) -> Option<i64> {
    if r.is_finite() && r.fract() == 0.0 && r.abs() < i64::MAX as f64 {
        Some(r as i64)
    } else {
        None
    }
}
