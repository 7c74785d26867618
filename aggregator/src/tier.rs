//! A single retention tier
//!
//! A tier downsamples every variable to one row per `store_period` and keeps
//! rows for `keep_period` (or forever). One mutex covers the aggregators and
//! all table access, so a reader never sees a half-written flush.

use crate::aggregate::Aggregator;
use crate::audit;
use crate::config::TierSpec;
use crate::error::{EngineError, Result};
use crate::metrics::{
    HISTORY_QUERY_DURATION, SCHEMA_COLUMNS_ADDED, TIER_FLUSH_TOTAL, TIER_ROWS_EVICTED,
};
use crate::schema::TableSchema;
use crate::storage::{Row, TierStore};
use std::sync::{Arc, Mutex, MutexGuard};
use timestrata_shared::utils::time::{millis_to_secs, secs_to_millis};
use timestrata_shared::{Point, ScalarValue, Series, VariableDescriptor};
use tracing::{debug, info, warn};

/// A flush fires this much before the nominal period boundary, absorbing
/// driver jitter.
pub const FLUSH_TOLERANCE_SECS: f64 = 0.1;

/// What a flush wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct FlushReport {
    pub row: Row,
    pub evicted: usize,
}

/// Points read from one tier by [`Tier::append_historical_values`].
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPage {
    /// One series per variable, newest point first.
    pub series: Vec<Series>,
    /// End timestamp of the oldest row read, or the requested end time when
    /// nothing matched.
    pub earliest: f64,
    pub rows: usize,
}

struct TierState {
    aggregators: Vec<Aggregator>,
    last_store_time: f64,
    last_update_time: f64,
}

pub struct Tier {
    name: String,
    store_period: f64,
    keep_period: Option<f64>,
    variables: Vec<VariableDescriptor>,
    schema: TableSchema,
    store: Arc<dyn TierStore>,
    state: Mutex<TierState>,
}

impl Tier {
    /// Open a tier, creating or extending its table as needed.
    pub fn open(
        store: Arc<dyn TierStore>,
        spec: &TierSpec,
        variables: &[VariableDescriptor],
        start_time: f64,
    ) -> Result<Self> {
        let schema = TableSchema::for_tier(&spec.name, variables)?;
        let change = store.ensure_table(&schema)?;
        if change.created {
            audit::table_created(&spec.name, schema.columns().len());
        }
        for column in &change.added_columns {
            audit::column_added(&spec.name, column);
            SCHEMA_COLUMNS_ADDED.with_label_values(&[&spec.name]).inc();
        }

        info!(
            "Tier {} ready: store every {}s, keep {}",
            spec.name,
            spec.store_period,
            spec.keep_period
                .map(|k| format!("{}s", k))
                .unwrap_or_else(|| "forever".to_string())
        );

        Ok(Self {
            name: spec.name.clone(),
            store_period: spec.store_period,
            keep_period: spec.keep_period,
            variables: variables.to_vec(),
            schema,
            store,
            state: Mutex::new(TierState {
                aggregators: variables.iter().map(Aggregator::for_variable).collect(),
                last_store_time: start_time,
                last_update_time: start_time,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store_period(&self) -> f64 {
        self.store_period
    }

    /// `None` means rows are never evicted.
    pub fn keep_period(&self) -> Option<f64> {
        self.keep_period
    }

    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn lock(&self) -> Result<MutexGuard<'_, TierState>> {
        self.state.lock().map_err(EngineError::poisoned)
    }

    /// Feed one snapshot taken at `current_time`.
    ///
    /// Each value is weighted by the time since the previous update. When the
    /// store period has elapsed, a row is written and expired rows evicted.
    /// With `commit` false the write stays pending until [`Tier::commit`].
    pub fn update(
        &self,
        values: &[Option<ScalarValue>],
        current_time: f64,
        commit: bool,
    ) -> Result<Option<FlushReport>> {
        if values.len() != self.variables.len() {
            return Err(EngineError::SnapshotWidth {
                tier: self.name.clone(),
                expected: self.variables.len(),
                got: values.len(),
            });
        }

        let mut state = self.lock()?;
        let elapsed = current_time - state.last_update_time;
        for ((variable, aggregator), value) in self
            .variables
            .iter()
            .zip(state.aggregators.iter_mut())
            .zip(values)
        {
            let Some(value) = value else { continue };
            match variable.coerce(value) {
                Some(v) => aggregator.add_value(Some(&v), elapsed),
                None => warn!(
                    "Tier {}: dropping {:?} for {} ({} domain)",
                    self.name,
                    value,
                    variable.name(),
                    variable.domain().kind()
                ),
            }
        }
        state.last_update_time = current_time;

        if current_time < state.last_store_time + self.store_period - FLUSH_TOLERANCE_SECS {
            return Ok(None);
        }

        let report = match self.flush(&mut state, current_time) {
            Ok(report) => {
                TIER_FLUSH_TOTAL
                    .with_label_values(&[&self.name, "success"])
                    .inc();
                report
            }
            Err(e) => {
                TIER_FLUSH_TOTAL
                    .with_label_values(&[&self.name, "error"])
                    .inc();
                return Err(e);
            }
        };
        if commit {
            self.store.commit()?;
        }
        Ok(Some(report))
    }

    fn flush(&self, state: &mut TierState, current_time: f64) -> Result<FlushReport> {
        let row = Row {
            timestamp_start_ms: secs_to_millis(state.last_store_time),
            timestamp_end_ms: secs_to_millis(current_time),
            values: state
                .aggregators
                .iter_mut()
                .zip(self.variables.iter())
                .map(|(a, v)| a.get_aggregated_value(true).map(|x| v.stored_value(x)))
                .collect(),
        };
        self.store.insert_row(&self.schema, &row)?;
        state.last_store_time = current_time;
        debug!(
            "Tier {} flushed [{}, {})",
            self.name, row.timestamp_start_ms, row.timestamp_end_ms
        );

        let mut evicted = 0;
        if let Some(keep) = self.keep_period {
            let cutoff_ms = secs_to_millis(current_time - keep);
            evicted = self.store.evict_before(&self.schema, cutoff_ms)?;
            if evicted > 0 {
                audit::rows_evicted(&self.name, evicted, cutoff_ms);
                TIER_ROWS_EVICTED
                    .with_label_values(&[&self.name])
                    .inc_by(evicted as f64);
            }
        }

        Ok(FlushReport { row, evicted })
    }

    /// Make pending writes durable.
    pub fn commit(&self) -> Result<()> {
        let _state = self.lock()?;
        self.store.commit()
    }

    /// Delete every persisted row. Aggregator state is kept.
    pub fn clear(&self) -> Result<usize> {
        let _state = self.lock()?;
        let count = self.store.clear(&self.schema)?;
        self.store.commit()?;
        audit::tier_cleared(&self.name, count);
        Ok(count)
    }

    /// Restart the window clock at `time` with empty aggregators.
    pub fn reset_clock(&self, time: f64) -> Result<()> {
        let mut state = self.lock()?;
        for aggregator in state.aggregators.iter_mut() {
            aggregator.reset();
        }
        state.last_store_time = time;
        state.last_update_time = time;
        Ok(())
    }

    /// Every persisted row, oldest first, with values in variable order.
    pub fn read_all_rows(&self) -> Result<Vec<Row>> {
        let _state = self.lock()?;
        self.store.fetch_all(&self.schema)
    }

    /// Read up to `max_points` of the most recent rows ending before
    /// `end_time`.
    pub fn append_historical_values(&self, max_points: usize, end_time: f64) -> Result<HistoricalPage> {
        let _state = self.lock()?;
        let timer = HISTORY_QUERY_DURATION
            .with_label_values(&[&self.name])
            .start_timer();

        let rows = self
            .store
            .fetch_recent(&self.schema, secs_to_millis(end_time), max_points)?;

        let mut series: Vec<Series> = self
            .variables
            .iter()
            .map(|v| Series::new(v.name()))
            .collect();
        for row in &rows {
            let timestamp = millis_to_secs(row.timestamp_end_ms);
            for ((variable, out), value) in self.variables.iter().zip(series.iter_mut()).zip(&row.values) {
                if let Some(value) = value {
                    out.points
                        .push(Point::new(timestamp, variable.presentation_value(value)));
                }
            }
        }

        let earliest = rows
            .last()
            .map(|r| millis_to_secs(r.timestamp_end_ms))
            .unwrap_or(end_time);
        timer.observe_duration();

        Ok(HistoricalPage {
            series,
            earliest,
            rows: rows.len(),
        })
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier")
            .field("name", &self.name)
            .field("store_period", &self.store_period)
            .field("keep_period", &self.keep_period)
            .field("variables", &self.variables.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn spec(name: &str, store: f64, keep: Option<f64>) -> TierSpec {
        TierSpec {
            name: name.to_string(),
            store_period: store,
            keep_period: keep,
        }
    }

    fn real_tier(store: f64, keep: Option<f64>) -> Tier {
        let vars = vec![VariableDescriptor::real("temp").unwrap()];
        Tier::open(Arc::new(MemoryStore::new()), &spec("data1s", store, keep), &vars, 0.0)
            .unwrap()
    }

    #[test]
    fn test_half_second_samples_average() {
        let tier = real_tier(1.0, Some(30.0));
        assert!(tier
            .update(&[Some(ScalarValue::Real(10.0))], 0.5, true)
            .unwrap()
            .is_none());
        let report = tier
            .update(&[Some(ScalarValue::Real(20.0))], 1.0, true)
            .unwrap()
            .unwrap();
        assert_eq!(report.row.timestamp_start_ms, 0);
        assert_eq!(report.row.timestamp_end_ms, 1000);
        assert_eq!(report.row.values, vec![Some(ScalarValue::Real(15.0))]);
    }

    #[test]
    fn test_flush_tolerance() {
        let tier = real_tier(10.0, None);
        let v = [Some(ScalarValue::Real(1.0))];
        assert!(tier.update(&v, 9.85, true).unwrap().is_none());
        assert!(tier.update(&v, 9.95, true).unwrap().is_some());
        // Next window starts at 9.95.
        assert!(tier.update(&v, 19.5, true).unwrap().is_none());
    }

    #[test]
    fn test_empty_window_persists_null() {
        let tier = real_tier(1.0, None);
        let report = tier.update(&[None], 1.0, true).unwrap().unwrap();
        assert_eq!(report.row.values, vec![None]);
    }

    #[test]
    fn test_snapshot_width_checked() {
        let tier = real_tier(1.0, None);
        assert!(matches!(
            tier.update(&[], 1.0, true),
            Err(EngineError::SnapshotWidth { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_uncoercible_value_is_dropped() {
        let tier = real_tier(1.0, None);
        let report = tier
            .update(&[Some(ScalarValue::from("warm"))], 1.0, true)
            .unwrap()
            .unwrap();
        assert_eq!(report.row.values, vec![None]);
    }

    #[test]
    fn test_history_for_enumerated() {
        let vars = vec![VariableDescriptor::enumerated("pump", ["off", "on"]).unwrap()];
        let tier = Tier::open(
            Arc::new(MemoryStore::new()),
            &spec("data1s", 1.0, None),
            &vars,
            0.0,
        )
        .unwrap();
        tier.update(&[Some(ScalarValue::from("on"))], 1.0, true).unwrap();
        tier.update(&[Some(ScalarValue::from("broken"))], 2.0, true).unwrap();

        let page = tier.append_historical_values(10, 100.0).unwrap();
        assert_eq!(page.rows, 2);
        assert_eq!(page.earliest, 1.0);
        assert_eq!(
            page.series[0].points,
            vec![Point::new(2.0, -1_i64), Point::new(1.0, 1_i64)]
        );
    }

    #[test]
    fn test_history_empty_returns_end_time() {
        let tier = real_tier(1.0, None);
        let page = tier.append_historical_values(10, 42.0).unwrap();
        assert_eq!(page.rows, 0);
        assert_eq!(page.earliest, 42.0);
        assert!(page.series[0].is_empty());
    }

    #[test]
    fn test_reset_clock() {
        let tier = real_tier(1.0, None);
        tier.update(&[Some(ScalarValue::Real(5.0))], 0.5, true).unwrap();
        tier.reset_clock(100.0).unwrap();
        let report = tier
            .update(&[Some(ScalarValue::Real(7.0))], 101.0, true)
            .unwrap()
            .unwrap();
        assert_eq!(report.row.timestamp_start_ms, 100_000);
        assert_eq!(report.row.values, vec![Some(ScalarValue::Real(7.0))]);
    }
}
