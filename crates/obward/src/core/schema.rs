//! Schema metadata for reflected tables, columns and foreign keys.
//!
//! These types are dialect-neutral: the SQLite reader fills them from
//! `PRAGMA` output and the sync engine turns them into target DDL.

use serde::{Deserialize, Serialize};

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Check if the table has a single-column primary key.
    pub fn has_single_pk(&self) -> bool {
        self.primary_key.len() == 1
    }

    /// Find a column by name (case-insensitive).
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Index of a column by name (case-insensitive).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Tables this table references through foreign keys, self excluded.
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.ref_table.as_str())
            .filter(|t| !t.eq_ignore_ascii_case(&self.name))
            .collect();
        refs.sort_unstable();
        refs.dedup();
        refs
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared data type as the source reports it (e.g. "VARCHAR(20)", "DATETIME").
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, is_nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_nullable,
            ordinal_pos: 0,
        }
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,
}
