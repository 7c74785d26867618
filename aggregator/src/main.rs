//! Retention daemon
//!
//! Reads sensor updates as newline-delimited JSON on stdin, samples them once
//! per tick into every tier, and commits on Ctrl-C. Closing stdin stops
//! updates but not sampling; the last values keep being recorded.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use timestrata_aggregator::{
    config::EngineConfig,
    driver::IngestDriver,
    ingest,
    registry::{VariableRegistry, VariableSource},
    storage,
    tier_set::TierSet,
};
use timestrata_shared::utils::time::system_time_secs_f64;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("TIMESTRATA_LOG_JSON").is_ok() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn read_updates(registry: &VariableRegistry) {
    let stdin = std::io::stdin();
    let mut line_no = 0;
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                return;
            }
        };
        line_no += 1;
        if let Err(e) = ingest::apply_line(registry, &line, line_no, system_time_secs_f64()) {
            warn!("Rejected update: {}", e);
        }
    }
    info!("Input closed after {} lines", line_no);
    log_current(registry);
}

fn log_current(registry: &VariableRegistry) {
    for variable in registry.variables() {
        match variable.formatted() {
            Ok(value) => info!(
                variable = variable.descriptor().name(),
                colour = variable.style().colour,
                "{}: {}",
                variable.style().display_name,
                value
            ),
            Err(e) => warn!("Failed to read {}: {}", variable.descriptor().name(), e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config =
        EngineConfig::load(config_path.as_deref()).context("Failed to load configuration")?;
    info!(
        "Starting timestrata aggregator: {} tiers, {} variables, tick {}ms",
        config.tiers.len(),
        config.variables.len(),
        config.tick_ms
    );

    let store = storage::open(&config.storage).context("Failed to open storage")?;
    let sources: [&dyn VariableSource; 1] = [&config];
    let registry = Arc::new(
        VariableRegistry::from_sources(&sources).context("Invalid variable definitions")?,
    );
    let tiers = Arc::new(
        TierSet::open(
            store,
            &config.tiers,
            registry.descriptors(),
            system_time_secs_f64(),
        )
        .context("Failed to open tiers")?,
    );

    let driver = IngestDriver::spawn(
        registry.clone(),
        tiers.clone(),
        Duration::from_millis(config.tick_ms),
    );

    // Blocking stdin reads stay off the runtime.
    let reader_registry = registry.clone();
    std::thread::spawn(move || read_updates(&reader_registry));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupted, shutting down");

    driver.shutdown().await.context("Shutdown failed")?;
    log_current(&registry);
    info!("Tiers committed, bye");
    Ok(())
}
