//! SQLite storage backend
//!
//! One connection is shared by every tier table. Writes open a transaction
//! lazily and [`TierStore::commit`] closes it, so callers that skip commits
//! (bulk rebuild) batch many flushes into one durable write.

use crate::error::{EngineError, Result};
use crate::schema::TableSchema;
use crate::storage::{Row, SchemaChange, TierStore};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use timestrata_shared::ScalarValue;
use tracing::debug;

/// `PRAGMA synchronous` level for the database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Off,
    #[default]
    Normal,
    Full,
}

impl SyncMode {
    fn as_pragma(&self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// SQLite-backed tier store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, sync: SyncMode) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        Self::configure(conn, sync)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn, SyncMode::Off)
    }

    fn configure(conn: Connection, sync: SyncMode) -> Result<Self> {
        conn.execute_batch(&format!("PRAGMA synchronous = {};", sync.as_pragma()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(EngineError::poisoned)
    }

    fn begin_if_needed(conn: &Connection) -> Result<()> {
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn columns_of(conn: &Connection, table: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn read_rows(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
        width: usize,
    ) -> Result<Vec<Row>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |r| {
                let timestamp_start_ms: i64 = r.get(0)?;
                let timestamp_end_ms: i64 = r.get(1)?;
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(from_sql_value(r.get::<_, Value>(i + 2)?));
                }
                Ok(Row {
                    timestamp_start_ms,
                    timestamp_end_ms,
                    values,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn to_sql_value(value: Option<&ScalarValue>) -> Value {
    match value {
        None => Value::Null,
        Some(ScalarValue::Integer(i)) => Value::Integer(*i),
        Some(ScalarValue::Real(r)) => Value::Real(*r),
        Some(ScalarValue::Text(s)) => Value::Text(s.clone()),
    }
}

fn from_sql_value(value: Value) -> Option<ScalarValue> {
    match value {
        Value::Null | Value::Blob(_) => None,
        Value::Integer(i) => Some(ScalarValue::Integer(i)),
        Value::Real(r) => Some(ScalarValue::Real(r)),
        Value::Text(s) => Some(ScalarValue::Text(s)),
    }
}

impl TierStore for SqliteStore {
    fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaChange> {
        let conn = self.lock()?;
        let existed = !Self::columns_of(&conn, schema.table())?.is_empty();

        // IF NOT EXISTS turns a concurrent creation into a no-op.
        conn.execute(&schema.create_statement(), [])?;

        let existing = Self::columns_of(&conn, schema.table())?;
        let mut change = SchemaChange {
            created: !existed,
            added_columns: Vec::new(),
        };
        for column in schema.missing_columns(&existing) {
            conn.execute(&schema.add_column_statement(column), [])?;
            change.added_columns.push(column.name.clone());
        }
        Ok(change)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let columns = Self::columns_of(&conn, table)?;
        if columns.is_empty() {
            return Err(EngineError::MissingTable(table.to_string()));
        }
        Ok(columns)
    }

    fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<()> {
        let conn = self.lock()?;
        Self::begin_if_needed(&conn)?;
        let mut values = Vec::with_capacity(row.values.len() + 2);
        values.push(Value::Integer(row.timestamp_start_ms));
        values.push(Value::Integer(row.timestamp_end_ms));
        values.extend(row.values.iter().map(|v| to_sql_value(v.as_ref())));
        conn.execute(&schema.insert_statement(), params_from_iter(values))?;
        Ok(())
    }

    fn evict_before(&self, schema: &TableSchema, cutoff_ms: i64) -> Result<usize> {
        let conn = self.lock()?;
        Self::begin_if_needed(&conn)?;
        let deleted = conn.execute(&schema.delete_before_statement(), params![cutoff_ms])?;
        Ok(deleted)
    }

    fn clear(&self, schema: &TableSchema) -> Result<usize> {
        let conn = self.lock()?;
        Self::begin_if_needed(&conn)?;
        let deleted = conn.execute(&schema.delete_all_statement(), [])?;
        Ok(deleted)
    }

    fn fetch_recent(&self, schema: &TableSchema, end_ms: i64, limit: usize) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Self::read_rows(
            &conn,
            &schema.select_recent_statement(),
            params![end_ms, limit],
            schema.variable_columns().len(),
        )
    }

    fn fetch_all(&self, schema: &TableSchema) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        Self::read_rows(
            &conn,
            &schema.select_all_statement(),
            [],
            schema.variable_columns().len(),
        )
    }

    fn commit(&self) -> Result<()> {
        let conn = self.lock()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
            debug!("Committed pending tier writes");
        }
        Ok(())
    }
}
