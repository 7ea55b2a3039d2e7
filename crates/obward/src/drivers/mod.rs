//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`postgres`]: PostgreSQL driver (deadpool-postgres, tokio-postgres)
//! - [`sqlite`]: SQLite driver (sqlx)
//! - [`common`]: Shared utilities (TLS, placeholder rewriting)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `Session`: transactional handle used by the sync engine and the ward writes
//!
//! SQLite additionally implements `SourceReader`, since the sync source is
//! always a SQLite file.

pub mod common;
pub mod postgres;
pub mod sqlite;

// Re-export common utilities
pub use common::{SslMode, TlsBuilder};

// Re-export driver types
pub use postgres::{PostgresDialect, PostgresSession};
pub use sqlite::{SqliteDialect, SqliteReader, SqliteSession};

#[cfg(test)]
mod tests {
    use super::*;
    // Dialect trait must be in scope to call its methods
    use crate::core::Dialect;

    #[test]
    fn test_dialects_differ_in_locking_and_limits() {
        let pg = PostgresDialect::new();
        let lite = SqliteDialect::new();
        assert_eq!(pg.name(), "postgres");
        assert_eq!(lite.name(), "sqlite");
        assert_ne!(pg.row_lock(), lite.row_lock());
        assert!(pg.max_params() < lite.max_params());
    }
}
