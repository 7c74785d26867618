//! Periodic ingestion driver
//!
//! Samples the live registry on a fixed interval and feeds the snapshot to
//! every tier. Tier work hits storage synchronously, so each tick runs on the
//! blocking pool.

use crate::error::{EngineError, Result};
use crate::registry::VariableRegistry;
use crate::tier_set::TierSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use timestrata_shared::utils::time::system_time_secs_f64;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct IngestDriver {
    tiers: Arc<TierSet>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IngestDriver {
    /// Start ticking every `tick`. Must be called inside a tokio runtime.
    pub fn spawn(registry: Arc<VariableRegistry>, tiers: Arc<TierSet>, tick: Duration) -> Self {
        let cancel = CancellationToken::new();

        async fn run_tick(registry: &Arc<VariableRegistry>, tiers: &Arc<TierSet>) {
            let snapshot = match registry.snapshot() {
                Ok(s) => s,
                Err(e) => {
                    error!("Snapshot failed: {}", e);
                    return;
                }
            };
            let tiers = tiers.clone();
            let result = tokio::task::spawn_blocking(move || {
                tiers.ingest(&snapshot, system_time_secs_f64(), true)
            })
            .await;
            match result {
                Ok(Ok(flushed)) if flushed > 0 => debug!("Tick flushed {} tiers", flushed),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!("Ingest failed: {}", e),
                Err(e) => error!("Ingest task panicked: {}", e),
            }
        }

        let task_cancel = cancel.clone();
        let task_tiers = tiers.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            // The first tick completes immediately; skip it so the first
            // sample is weighted by a full interval.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        run_tick(&registry, &task_tiers).await;
                    }
                    _ = task_cancel.cancelled() => {
                        info!("Ingest driver stopping");
                        break;
                    }
                }
            }
        });

        Self {
            tiers,
            cancel,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop ticking, wait for the task, then commit whatever is pending.
    pub async fn shutdown(&self) -> Result<()> {
        self.cancel.cancel();
        let handle = {
            let mut guard = self.handle.lock().map_err(EngineError::poisoned)?;
            guard.take()
        };
        if let Some(h) = handle {
            h.await?;
        }
        let tiers = self.tiers.clone();
        tokio::task::spawn_blocking(move || tiers.commit_all()).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TierSpec, VariableSpec};
    use crate::storage::memory::MemoryStore;
    use crate::storage::TierStore;
    use timestrata_shared::{Domain, ScalarValue};

    #[tokio::test]
    async fn test_driver_flushes_and_stops() {
        let mut registry = VariableRegistry::new();
        registry
            .register(&VariableSpec::new("temp", Domain::Real))
            .unwrap();
        let registry = Arc::new(registry);
        registry
            .update("temp", ScalarValue::Real(20.0), system_time_secs_f64())
            .unwrap();

        let store: Arc<dyn TierStore> = Arc::new(MemoryStore::new());
        let tiers = Arc::new(
            TierSet::open(
                store,
                &[TierSpec::new("fast", 0.2, None)],
                registry.descriptors(),
                system_time_secs_f64(),
            )
            .unwrap(),
        );

        let driver = IngestDriver::spawn(registry.clone(), tiers.clone(), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(700)).await;
        driver.shutdown().await.unwrap();

        let rows = tiers.tiers()[0].read_all_rows().unwrap();
        assert!(!rows.is_empty());
        for row in &rows {
            let value = row.values[0].as_ref().and_then(|v| v.as_f64()).unwrap();
            assert!((value - 20.0).abs() < 1e-9);
        }
        assert!(driver.cancel_token().is_cancelled());
    }
}
