//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Provides PostgreSQL-specific column types, row locking and DROP syntax.

use crate::core::traits::Dialect;
use crate::dialect::CanonicalType;

/// Bind parameters per statement; the wire limit is 65535, kept well below.
const PG_MAX_PARAMS: usize = 30_000;

/// PostgreSQL dialect implementation.
///
/// Implements the Strategy pattern for SQL syntax differences.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn native_type(&self, canonical: &CanonicalType) -> String {
        match canonical {
            CanonicalType::Timestamp => "timestamp".to_string(),
            CanonicalType::Date => "date".to_string(),
            CanonicalType::Numeric => "numeric".to_string(),
            CanonicalType::Boolean => "boolean".to_string(),
            CanonicalType::Text => "text".to_string(),
            CanonicalType::Integer => "integer".to_string(),
            CanonicalType::Float => "double precision".to_string(),
            CanonicalType::Binary => "bytea".to_string(),
            CanonicalType::Unmapped(name) => name.clone(),
        }
    }

    fn row_lock(&self) -> &'static str {
        " FOR UPDATE"
    }

    fn drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", table)
    }

    fn max_params(&self) -> usize {
        PG_MAX_PARAMS
    }

    // Pass-through values arrive typed as text or numbers; an explicit cast
    // lets the server convert them to the verbatim column type.
    fn unmapped_value_sql(&self, placeholder: &str, native_type: &str) -> String {
        format!("CAST({} AS {})", placeholder, native_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_values_are_cast_to_column_type() {
        let dialect = PostgresDialect::new();
        assert_eq!(
            dialect.unmapped_value_sql("$3", "TIMESTAMP"),
            "CAST($3 AS TIMESTAMP)"
        );
    }

    #[test]
    fn test_native_types() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.native_type(&CanonicalType::Timestamp), "timestamp");
        assert_eq!(dialect.native_type(&CanonicalType::Boolean), "boolean");
        assert_eq!(
            dialect.native_type(&CanonicalType::Float),
            "double precision"
        );
        assert_eq!(
            dialect.native_type(&CanonicalType::Unmapped("GEOMETRY".into())),
            "GEOMETRY"
        );
    }

    #[test]
    fn test_lock_and_drop() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.row_lock(), " FOR UPDATE");
        assert_eq!(
            dialect.drop_table_sql("\"bed\""),
            "DROP TABLE IF EXISTS \"bed\" CASCADE"
        );
    }
}
