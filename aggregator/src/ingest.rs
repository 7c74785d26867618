//! Newline-delimited JSON ingestion
//!
//! Two line formats are accepted:
//!
//! * sensor updates, `{"name": "indoor_temp", "value": 21.5}`, applied to the
//!   live registry as they arrive;
//! * timestamped records, `{"timestamp": 1700000000.0, "values": {...}}`,
//!   replayed straight into the tiers (backfill).

use crate::error::{EngineError, Result};
use crate::registry::VariableRegistry;
use crate::rebuild::COMMIT_EVERY;
use crate::tier_set::TierSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufRead;
use timestrata_shared::ScalarValue;
use tracing::{debug, warn};

/// One sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorUpdate {
    pub name: String,
    pub value: ScalarValue,
    /// Unix seconds; receive time when absent
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Readings taken together at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub timestamp: f64,
    pub values: HashMap<String, ScalarValue>,
}

/// Parse one line; blank lines yield `None`.
pub fn parse_update(line: &str, line_no: usize) -> Result<Option<SensorUpdate>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|source| EngineError::Malformed {
            line: line_no,
            source,
        })
}

/// Apply one update line to the registry. Returns whether a value was
/// recorded.
pub fn apply_line(registry: &VariableRegistry, line: &str, line_no: usize, now: f64) -> Result<bool> {
    let Some(update) = parse_update(line, line_no)? else {
        return Ok(false);
    };
    let at = update.timestamp.unwrap_or(now);
    registry.update(&update.name, update.value, at)?;
    debug!("Updated {} at {}", update.name, at);
    Ok(true)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayReport {
    pub records: usize,
    pub flushes: usize,
    pub unknown_variables: usize,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
}

/// Replay timestamped records into `tiers`. Values stick in `registry`
/// until overwritten, as with live ingestion. Records should be in time
/// order; writes are committed in batches.
///
/// Tier clocks are reset to the first record's timestamp, so its values
/// open the first window and only later records add weighted samples.
pub fn replay_records(
    reader: impl BufRead,
    registry: &VariableRegistry,
    tiers: &TierSet,
    mut progress: impl FnMut(usize),
) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: SnapshotRecord =
            serde_json::from_str(line).map_err(|source| EngineError::Malformed {
                line: i + 1,
                source,
            })?;

        if report.records == 0 {
            // Backfilled windows start at the first record, not at the time
            // the tiers were opened.
            tiers.reset_clocks(record.timestamp)?;
            debug!("Replay clock starts at {}", record.timestamp);
        }

        for (name, value) in record.values {
            match registry.update(&name, value, record.timestamp) {
                Ok(()) => {}
                Err(EngineError::UnknownVariable(name)) => {
                    warn!("Line {}: unknown variable {}", i + 1, name);
                    report.unknown_variables += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let snapshot = registry.snapshot()?;
        report.flushes += tiers.ingest(&snapshot, record.timestamp, false)?;
        report.records += 1;
        report.first_timestamp.get_or_insert(record.timestamp);
        report.last_timestamp = Some(record.timestamp);

        if report.records % COMMIT_EVERY == 0 {
            tiers.commit_all()?;
            progress(report.records);
        }
    }
    tiers.commit_all()?;
    progress(report.records);
    Ok(report)
}
