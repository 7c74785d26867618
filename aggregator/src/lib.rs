//! Multi-tier downsampling and retention engine

pub mod aggregate;
pub mod audit;
pub mod config;
pub mod driver;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod rebuild;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod tier;
pub mod tier_set;

pub use error::{EngineError, Result};
