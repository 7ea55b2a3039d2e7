//! Canonical types and source type mapping.
//!
//! - [`CanonicalType`]: dialect-neutral column type and value coercion
//! - [`SqliteToCanonicalMapper`]: SQLite declared type → canonical type
//!
//! Target dialects render canonical types through
//! [`Dialect::native_type`](crate::core::Dialect::native_type).

mod canonical;
mod typemap;

pub use canonical::{parse_timestamp_text, to_timestamp, CanonicalType};
pub use typemap::SqliteToCanonicalMapper;
