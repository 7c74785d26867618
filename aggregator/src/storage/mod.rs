//! Storage backends
//!
//! A [`TierStore`] persists tier rows. All tiers of a set share one store;
//! each tier serialises its own calls through its lock, so backends only need
//! to be safe for independent callers.

pub mod memory;
pub mod sqlite;

use crate::config::StorageConfig;
use crate::error::Result;
use crate::schema::TableSchema;
use std::sync::Arc;
use timestrata_shared::ScalarValue;
use tracing::info;

/// One persisted aggregation window.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub timestamp_start_ms: i64,
    /// Exclusive upper bound of the window.
    pub timestamp_end_ms: i64,
    /// One entry per variable column of the schema, in schema order.
    pub values: Vec<Option<ScalarValue>>,
}

/// What `ensure_table` had to do to bring a table up to its schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaChange {
    pub created: bool,
    pub added_columns: Vec<String>,
}

/// Persistent row store for tier tables.
pub trait TierStore: Send + Sync {
    /// Create the table if absent and add any missing columns. Existing rows
    /// and extra columns are preserved.
    fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaChange>;

    /// Column names currently present in `table`, in storage order.
    fn table_columns(&self, table: &str) -> Result<Vec<String>>;

    fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<()>;

    /// Delete rows with `timestamp_end_ms < cutoff_ms`; returns the count.
    fn evict_before(&self, schema: &TableSchema, cutoff_ms: i64) -> Result<usize>;

    /// Delete every row of the table; returns the count.
    fn clear(&self, schema: &TableSchema) -> Result<usize>;

    /// Up to `limit` rows with `timestamp_end_ms < end_ms`, newest first.
    fn fetch_recent(&self, schema: &TableSchema, end_ms: i64, limit: usize) -> Result<Vec<Row>>;

    /// Every row, oldest first.
    fn fetch_all(&self, schema: &TableSchema) -> Result<Vec<Row>>;

    /// Make pending writes durable.
    fn commit(&self) -> Result<()>;
}

/// Open the backend named by `config`.
pub fn open(config: &StorageConfig) -> Result<Arc<dyn TierStore>> {
    match config {
        StorageConfig::Sqlite { path, synchronous } => {
            info!("Opening SQLite store at {}", path.display());
            Ok(Arc::new(sqlite::SqliteStore::open(path, *synchronous)?))
        }
        StorageConfig::InMemory => {
            info!("Using in-memory store; rows will not survive restart");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
    }
}
