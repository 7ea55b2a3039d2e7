//! SQLite SQL dialect.

use crate::core::traits::Dialect;
use crate::dialect::CanonicalType;

/// SQLite's compiled-in default for `SQLITE_MAX_VARIABLE_NUMBER` since 3.32.
const SQLITE_MAX_PARAMS: usize = 32_766;

/// SQLite dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn native_type(&self, canonical: &CanonicalType) -> String {
        match canonical {
            CanonicalType::Timestamp => "DATETIME".to_string(),
            CanonicalType::Date => "DATE".to_string(),
            CanonicalType::Numeric => "NUMERIC".to_string(),
            CanonicalType::Boolean => "BOOLEAN".to_string(),
            CanonicalType::Text => "TEXT".to_string(),
            CanonicalType::Integer => "INTEGER".to_string(),
            CanonicalType::Float => "REAL".to_string(),
            CanonicalType::Binary => "BLOB".to_string(),
            CanonicalType::Unmapped(name) => name.clone(),
        }
    }

    // Sessions begin with BEGIN IMMEDIATE, which holds the database write
    // lock for the whole transaction; there is no row locking.
    fn row_lock(&self) -> &'static str {
        ""
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", table)
    }

    fn max_params(&self) -> usize {
        SQLITE_MAX_PARAMS
    }

    // Column types are affinities only. A CAST would apply affinity rules
    // (CAST('2024-03-01' AS TIMESTAMP) is 2024), so the value goes in as bound.
    fn unmapped_value_sql(&self, placeholder: &str, _native_type: &str) -> String {
        placeholder.to_string()
    }
}
