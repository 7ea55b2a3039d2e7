//! Core traits for the sync engine and the ward write operations.
//!
//! - [`SourceReader`]: reflects and reads the source database
//! - [`Session`] / [`Transaction`]: the injected handle every write goes through
//! - [`Dialect`]: SQL syntax strategy for the target engine
//! - [`TypeMapper`]: maps source column types to canonical types
//!
//! SQL handed to a [`Transaction`] uses `$1`, `$2`, ... placeholders on
//! every backend; sessions translate to their native form before executing.

use async_trait::async_trait;
use tracing::warn;

use crate::dialect::CanonicalType;
use crate::error::Result;

use super::schema::{Column, Table};
use super::value::{Row, SqlValue};

/// Read schema and rows from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Reflect every user table with its columns, primary key and foreign keys.
    async fn extract_schema(&self) -> Result<Vec<Table>>;

    /// Read every row of a table, ordered by primary key when it has one.
    ///
    /// Values are returned in the table's column order.
    async fn read_rows(&self, table: &Table) -> Result<Vec<Vec<SqlValue<'static>>>>;

    /// Get the database type identifier (e.g. "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Injected database handle.
///
/// Every sync phase and every ward operation opens its own transaction
/// through [`Session::begin`]; nothing is written outside one.
#[async_trait]
pub trait Session: Send + Sync {
    /// SQL dialect of the underlying database.
    fn dialect(&self) -> &dyn Dialect;

    /// Start a new transaction at the backend's default isolation level.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection pool.
    async fn close(&self);
}

/// An open transaction.
///
/// Dropping a transaction without calling [`commit`](Transaction::commit)
/// discards its writes.
#[async_trait]
pub trait Transaction: Send {
    /// Execute a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<u64>;

    /// Run a query and collect every row.
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<Vec<Row>>;

    /// Run a query and return its first row, if any.
    async fn fetch_optional(
        &mut self,
        sql: &str,
        params: &[SqlValue<'static>],
    ) -> Result<Option<Row>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Commit `tx` if `result` is Ok, otherwise roll it back and return the error.
///
/// A failed rollback is logged; the original error is what the caller sees.
pub async fn finish<T>(tx: Box<dyn Transaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!("Rollback failed after error ({}): {}", e, rb);
            }
            Err(e)
        }
    }
}

/// SQL syntax strategy for different database engines.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g. "postgres", "sqlite").
    fn name(&self) -> &str;

    /// Render a canonical type as a native column type.
    fn native_type(&self, canonical: &CanonicalType) -> String;

    /// Row-lock suffix for a read-then-write SELECT.
    ///
    /// Empty where the engine serializes writers itself.
    fn row_lock(&self) -> &'static str;

    /// Statement dropping a table if it exists, cascading to dependents where supported.
    fn drop_table_sql(&self, table: &str) -> String;

    /// Largest number of bind parameters a single statement may carry.
    fn max_params(&self) -> usize;

    /// Value expression inserting `placeholder` into a column whose type has
    /// no canonical mapping and was rendered verbatim as `native_type`.
    fn unmapped_value_sql(&self, placeholder: &str, native_type: &str) -> String;
}

/// Maps source column types onto the canonical type set.
pub trait TypeMapper: Send + Sync {
    /// Map a source type string to a canonical type.
    fn map_type(&self, data_type: &str) -> TypeMapping;

    /// Map a column definition.
    fn map_column(&self, col: &Column) -> ColumnMapping {
        let mapping = self.map_type(&col.data_type);
        ColumnMapping {
            name: col.name.clone(),
            canonical: mapping.canonical,
            is_nullable: col.is_nullable,
            warning: mapping.warning,
        }
    }
}

/// Result of mapping a column.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub name: String,
    pub canonical: CanonicalType,
    pub is_nullable: bool,
    /// Warning message if the mapping is lossy or unknown.
    pub warning: Option<String>,
}

/// Result of mapping a source type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeMapping {
    pub canonical: CanonicalType,
    /// Whether this mapping may lose data or precision.
    pub is_lossy: bool,
    /// Warning message for lossy mappings.
    pub warning: Option<String>,
}

impl TypeMapping {
    /// Create a lossless type mapping.
    pub fn lossless(canonical: CanonicalType) -> Self {
        Self {
            canonical,
            is_lossy: false,
            warning: None,
        }
    }

    /// Create a lossy type mapping with a warning.
    pub fn lossy(canonical: CanonicalType, warning: impl Into<String>) -> Self {
        Self {
            canonical,
            is_lossy: true,
            warning: Some(warning.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mapping_lossless() {
        let mapping = TypeMapping::lossless(CanonicalType::Integer);
        assert_eq!(mapping.canonical, CanonicalType::Integer);
        assert!(!mapping.is_lossy);
        assert!(mapping.warning.is_none());
    }

    #[test]
    fn test_type_mapping_lossy() {
        let mapping = TypeMapping::lossy(
            CanonicalType::Unmapped("GEOMETRY".into()),
            "no canonical equivalent",
        );
        assert!(mapping.is_lossy);
        assert_eq!(mapping.warning.as_deref(), Some("no canonical equivalent"));
    }
}
