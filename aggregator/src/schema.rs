//! Tier table schemas and statement builders
//!
//! Every statement the SQLite backend runs is built here from a validated
//! [`TableSchema`]. Identifiers are checked against
//! `[A-Za-z_][A-Za-z0-9_]*` when the schema is built and then double-quoted;
//! values are always bound as positional parameters.

use crate::error::{EngineError, Result};
use timestrata_shared::utils::is_valid_identifier;
use timestrata_shared::{SqlType, VariableDescriptor, TIMESTAMP_END_COLUMN, TIMESTAMP_START_COLUMN};

/// One persisted column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnDef {
    fn definition(&self) -> String {
        format!("{} {}", quote_ident(&self.name), self.sql_type)
    }
}

/// Required layout of one tier table: the two timestamp columns followed by
/// one column per tracked variable, in variable order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table: String,
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn for_tier(table: &str, variables: &[VariableDescriptor]) -> Result<Self> {
        if !is_valid_identifier(table) {
            return Err(EngineError::InvalidTableName(table.to_string()));
        }
        let mut columns = vec![
            ColumnDef {
                name: TIMESTAMP_START_COLUMN.to_string(),
                sql_type: SqlType::Integer,
            },
            ColumnDef {
                name: TIMESTAMP_END_COLUMN.to_string(),
                sql_type: SqlType::Integer,
            },
        ];
        for variable in variables {
            if columns.iter().any(|c| c.name == variable.name()) {
                return Err(EngineError::DuplicateVariable(variable.name().to_string()));
            }
            // Descriptor names are validated on construction.
            columns.push(ColumnDef {
                name: variable.name().to_string(),
                sql_type: variable.sql_type(),
            });
        }
        Ok(Self {
            table: table.to_string(),
            columns,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Columns holding variable values (everything after the timestamps).
    pub fn variable_columns(&self) -> &[ColumnDef] {
        &self.columns[2..]
    }

    /// Required columns absent from `existing`.
    pub fn missing_columns<'a>(&'a self, existing: &[String]) -> Vec<&'a ColumnDef> {
        self.columns
            .iter()
            .filter(|c| !existing.iter().any(|e| e == &c.name))
            .collect()
    }

    pub fn create_statement(&self) -> String {
        let defs: Vec<String> = self.columns.iter().map(ColumnDef::definition).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table),
            defs.join(", ")
        )
    }

    pub fn add_column_statement(&self, column: &ColumnDef) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(&self.table),
            column.definition()
        )
    }

    pub fn insert_statement(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            self.column_list(),
            placeholders.join(", ")
        )
    }

    /// Newest rows strictly before `?1` (end ms), capped at `?2` rows.
    pub fn select_recent_statement(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} < ?1 ORDER BY {} DESC LIMIT ?2",
            self.column_list(),
            quote_ident(&self.table),
            quote_ident(TIMESTAMP_END_COLUMN),
            quote_ident(TIMESTAMP_END_COLUMN)
        )
    }

    pub fn select_all_statement(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {} ASC",
            self.column_list(),
            quote_ident(&self.table),
            quote_ident(TIMESTAMP_END_COLUMN)
        )
    }

    pub fn delete_before_statement(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} < ?1",
            quote_ident(&self.table),
            quote_ident(TIMESTAMP_END_COLUMN)
        )
    }

    pub fn delete_all_statement(&self) -> String {
        format!("DELETE FROM {}", quote_ident(&self.table))
    }

    fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        let vars = vec![
            VariableDescriptor::real("temp").unwrap(),
            VariableDescriptor::enumerated("pump", ["off", "on"]).unwrap(),
        ];
        TableSchema::for_tier("data1s", &vars).unwrap()
    }

    #[test]
    fn test_create_statement() {
        assert_eq!(
            schema().create_statement(),
            "CREATE TABLE IF NOT EXISTS \"data1s\" (\"timestamp_start_ms\" INTEGER, \
             \"timestamp_end_ms\" INTEGER, \"temp\" REAL, \"pump\" TEXT)"
        );
    }

    #[test]
    fn test_insert_uses_placeholders() {
        let stmt = schema().insert_statement();
        assert!(stmt.ends_with("VALUES (?1, ?2, ?3, ?4)"));
    }

    #[test]
    fn test_missing_columns() {
        let s = schema();
        let existing = vec![
            "timestamp_start_ms".to_string(),
            "timestamp_end_ms".to_string(),
            "temp".to_string(),
            "retired_column".to_string(),
        ];
        let missing = s.missing_columns(&existing);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "pump");
        assert_eq!(
            s.add_column_statement(missing[0]),
            "ALTER TABLE \"data1s\" ADD COLUMN \"pump\" TEXT"
        );
    }

    #[test]
    fn test_rejects_bad_table_name() {
        assert!(matches!(
            TableSchema::for_tier("data; DROP", &[]),
            Err(EngineError::InvalidTableName(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_variables() {
        let vars = vec![
            VariableDescriptor::real("temp").unwrap(),
            VariableDescriptor::real("temp").unwrap(),
        ];
        assert!(matches!(
            TableSchema::for_tier("t", &vars),
            Err(EngineError::DuplicateVariable(_))
        ));
    }
}
