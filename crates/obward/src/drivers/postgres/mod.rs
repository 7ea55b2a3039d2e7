//! PostgreSQL driver.
//!
//! This module provides PostgreSQL-specific implementations:
//!
//! - [`PostgresDialect`]: SQL syntax strategy for PostgreSQL
//! - [`PostgresSession`]: transactional session over a deadpool-postgres pool

mod dialect;
mod session;

pub use dialect::PostgresDialect;
pub use session::PostgresSession;
