//! Reconstructed point series
//!
//! These are the presentation-side shapes produced by historical queries and
//! by the live registry; they serialize straight to JSON for chart clients.

use crate::types::value::ScalarValue;
use serde::{Deserialize, Serialize};

/// One chart point: window end (Unix seconds) and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub timestamp: f64,
    pub value: ScalarValue,
}

impl Point {
    pub fn new(timestamp: f64, value: impl Into<ScalarValue>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// Points for a single variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub variable: String,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sort points oldest-first.
    pub fn sort_chronologically(&mut self) {
        self.points
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    }
}
