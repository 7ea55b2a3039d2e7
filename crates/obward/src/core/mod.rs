//! Core abstractions shared by the sync engine and the ward operations.
//!
//! - [`schema`]: Table, column, and foreign key metadata types
//! - [`value`]: SQL value and row representation
//! - [`traits`]: Readers, sessions, dialects and type mappers
//! - [`identifier`]: Identifier validation and quoting
//!
//! Driver modules (`drivers/sqlite`, `drivers/postgres`) implement the
//! traits; the sync engine and ward operations only see the traits.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use schema::{Column, ForeignKey, Table};
pub use traits::{
    ColumnMapping, Dialect, Session, SourceReader, Transaction, TypeMapper, TypeMapping,
};
pub use value::{Row, SqlNullType, SqlValue};
