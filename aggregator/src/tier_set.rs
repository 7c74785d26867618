//! The full set of retention tiers
//!
//! Every tier sees the same snapshots. Tiers are independent: each call takes
//! and releases one tier's lock at a time.

use crate::config::TierSpec;
use crate::error::{EngineError, Result};
use crate::history::{self, HistoricalQuery, HistoryResult};
use crate::metrics::INGEST_TICK_DURATION;
use crate::storage::TierStore;
use crate::tier::Tier;
use std::collections::HashSet;
use std::sync::Arc;
use timestrata_shared::{ScalarValue, VariableDescriptor};
use tracing::error;

pub struct TierSet {
    variables: Vec<VariableDescriptor>,
    /// Finest store period first
    tiers: Vec<Arc<Tier>>,
}

impl TierSet {
    pub fn open(
        store: Arc<dyn TierStore>,
        specs: &[TierSpec],
        variables: Vec<VariableDescriptor>,
        start_time: f64,
    ) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                return Err(EngineError::Config(format!(
                    "duplicate tier name: {}",
                    spec.name
                )));
            }
        }

        let mut ordered: Vec<&TierSpec> = specs.iter().collect();
        ordered.sort_by(|a, b| a.store_period.total_cmp(&b.store_period));

        let tiers = ordered
            .into_iter()
            .map(|spec| Tier::open(store.clone(), spec, &variables, start_time).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { variables, tiers })
    }

    pub fn variables(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    pub fn tiers(&self) -> &[Arc<Tier>] {
        &self.tiers
    }

    pub fn tier(&self, name: &str) -> Result<&Arc<Tier>> {
        self.tiers
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| EngineError::UnknownTier(name.to_string()))
    }

    /// Feed one snapshot to every tier. All tiers are attempted; the first
    /// failure is returned. Yields the number of tiers that flushed.
    pub fn ingest(&self, snapshot: &[Option<ScalarValue>], now: f64, commit: bool) -> Result<usize> {
        let _timer = INGEST_TICK_DURATION.start_timer();
        let mut flushed = 0;
        let mut first_error = None;
        for tier in &self.tiers {
            match tier.update(snapshot, now, commit) {
                Ok(Some(_)) => flushed += 1,
                Ok(None) => {}
                Err(e) => {
                    error!("Tier {} update failed: {}", tier.name(), e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(flushed),
        }
    }

    pub fn commit_all(&self) -> Result<()> {
        for tier in &self.tiers {
            tier.commit()?;
        }
        Ok(())
    }

    /// Delete every row of every tier; returns the total removed.
    pub fn clear_all(&self) -> Result<usize> {
        let mut total = 0;
        for tier in &self.tiers {
            total += tier.clear()?;
        }
        Ok(total)
    }

    pub fn reset_clocks(&self, time: f64) -> Result<()> {
        for tier in &self.tiers {
            tier.reset_clock(time)?;
        }
        Ok(())
    }

    pub fn history(&self, query: &HistoricalQuery) -> Result<HistoryResult> {
        history::reconstruct(&self.tiers, query)
    }
}
