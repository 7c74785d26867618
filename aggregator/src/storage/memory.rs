//! In-memory storage backend
//!
//! Keeps each tier table as a `VecDeque` of rows behind one `RwLock`. Rows
//! arrive in end-timestamp order, so eviction pops from the front. Used for
//! tests and for runs that do not need durability.

use crate::error::{EngineError, Result};
use crate::schema::TableSchema;
use crate::storage::{Row, SchemaChange, TierStore};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    rows: VecDeque<Row>,
}

/// Thread-safe in-memory tier store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held for `table`.
    pub fn len(&self, table: &str) -> Result<usize> {
        let tables = self.tables.read().map_err(EngineError::poisoned)?;
        Ok(tables.get(table).map(|t| t.rows.len()).unwrap_or(0))
    }

    /// Project a stored row onto the columns `schema` asks for; columns the
    /// row was written without read as null.
    fn project(table: &MemoryTable, schema: &TableSchema, row: &Row) -> Row {
        let stored = &table.columns[2..];
        let values = schema
            .variable_columns()
            .iter()
            .map(|c| {
                stored
                    .iter()
                    .position(|name| *name == c.name)
                    .and_then(|i| row.values.get(i).cloned().flatten())
            })
            .collect();
        Row {
            timestamp_start_ms: row.timestamp_start_ms,
            timestamp_end_ms: row.timestamp_end_ms,
            values,
        }
    }
}

impl TierStore for MemoryStore {
    fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaChange> {
        let mut tables = self.tables.write().map_err(EngineError::poisoned)?;
        let mut change = SchemaChange::default();
        let table = tables.entry(schema.table().to_string()).or_insert_with(|| {
            change.created = true;
            MemoryTable::default()
        });
        let missing: Vec<String> = schema
            .missing_columns(&table.columns)
            .into_iter()
            .map(|c| c.name.clone())
            .collect();
        for name in missing {
            table.columns.push(name.clone());
            for row in table.rows.iter_mut() {
                row.values.push(None);
            }
            if !change.created {
                change.added_columns.push(name);
            }
        }
        Ok(change)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let tables = self.tables.read().map_err(EngineError::poisoned)?;
        tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| EngineError::MissingTable(table.to_string()))
    }

    fn insert_row(&self, schema: &TableSchema, row: &Row) -> Result<()> {
        let mut tables = self.tables.write().map_err(EngineError::poisoned)?;
        let table = tables
            .get_mut(schema.table())
            .ok_or_else(|| EngineError::MissingTable(schema.table().to_string()))?;
        // Lay the row out in storage column order.
        let mut values = vec![None; table.columns.len() - 2];
        for (column, value) in schema.variable_columns().iter().zip(&row.values) {
            if let Some(i) = table.columns[2..].iter().position(|n| *n == column.name) {
                values[i] = value.clone();
            }
        }
        table.rows.push_back(Row {
            timestamp_start_ms: row.timestamp_start_ms,
            timestamp_end_ms: row.timestamp_end_ms,
            values,
        });
        Ok(())
    }

    fn evict_before(&self, schema: &TableSchema, cutoff_ms: i64) -> Result<usize> {
        let mut tables = self.tables.write().map_err(EngineError::poisoned)?;
        let Some(table) = tables.get_mut(schema.table()) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|r| r.timestamp_end_ms >= cutoff_ms);
        Ok(before - table.rows.len())
    }

    fn clear(&self, schema: &TableSchema) -> Result<usize> {
        let mut tables = self.tables.write().map_err(EngineError::poisoned)?;
        let Some(table) = tables.get_mut(schema.table()) else {
            return Ok(0);
        };
        let count = table.rows.len();
        table.rows.clear();
        Ok(count)
    }

    fn fetch_recent(&self, schema: &TableSchema, end_ms: i64, limit: usize) -> Result<Vec<Row>> {
        let tables = self.tables.read().map_err(EngineError::poisoned)?;
        let Some(table) = tables.get(schema.table()) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<Row> = table
            .rows
            .iter()
            .filter(|r| r.timestamp_end_ms < end_ms)
            .map(|r| Self::project(table, schema, r))
            .collect();
        out.sort_by(|a, b| b.timestamp_end_ms.cmp(&a.timestamp_end_ms));
        out.truncate(limit);
        Ok(out)
    }

    fn fetch_all(&self, schema: &TableSchema) -> Result<Vec<Row>> {
        let tables = self.tables.read().map_err(EngineError::poisoned)?;
        let Some(table) = tables.get(schema.table()) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<Row> = table
            .rows
            .iter()
            .map(|r| Self::project(table, schema, r))
            .collect();
        out.sort_by_key(|r| r.timestamp_end_ms);
        Ok(out)
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timestrata_shared::{ScalarValue, VariableDescriptor};

    #[test]
    fn test_schema_extension_backfills_null() {
        let store = MemoryStore::new();
        let old = TableSchema::for_tier("t", &[VariableDescriptor::real("a").unwrap()]).unwrap();
        assert!(store.ensure_table(&old).unwrap().created);
        store
            .insert_row(
                &old,
                &Row {
                    timestamp_start_ms: 0,
                    timestamp_end_ms: 1000,
                    values: vec![Some(ScalarValue::Real(1.0))],
                },
            )
            .unwrap();

        // New schema lists the new column first; projection must follow names.
        let new = TableSchema::for_tier(
            "t",
            &[
                VariableDescriptor::real("b").unwrap(),
                VariableDescriptor::real("a").unwrap(),
            ],
        )
        .unwrap();
        let change = store.ensure_table(&new).unwrap();
        assert_eq!(change.added_columns, vec!["b"]);

        let rows = store.fetch_all(&new).unwrap();
        assert_eq!(rows[0].values, vec![None, Some(ScalarValue::Real(1.0))]);
    }

    #[test]
    fn test_evict_strictly_before_cutoff() {
        let store = MemoryStore::new();
        let s = TableSchema::for_tier("t", &[]).unwrap();
        store.ensure_table(&s).unwrap();
        for end in [1000, 2000, 3000] {
            store
                .insert_row(
                    &s,
                    &Row {
                        timestamp_start_ms: end - 1000,
                        timestamp_end_ms: end,
                        values: vec![],
                    },
                )
                .unwrap();
        }
        assert_eq!(store.evict_before(&s, 2000).unwrap(), 1);
        assert_eq!(store.len("t").unwrap(), 2);
    }
}
