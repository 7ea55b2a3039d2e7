//! Utilities shared across database drivers.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections
//! - [`placeholder`]: rewriting of `$n` parameter placeholders

pub mod placeholder;
pub mod tls;

pub use tls::{SslMode, TlsBuilder};
