//! Source type mappers.
//!
//! The SQLite mapper reproduces the ward database's historical mapping:
//! ordered substring checks against the upper-cased declared type, first
//! match wins. The order matters (`DATETIME` before `DATE`, `TEXT` before
//! `INT`), and the substring semantics are kept as-is, so for example
//! `POINT` maps to integer and `TIMESTAMP` is unmapped.

use crate::core::traits::{TypeMapper, TypeMapping};

use super::canonical::CanonicalType;

/// Ordered substring rules. The first rule with any matching needle wins.
const SQLITE_RULES: &[(&[&str], CanonicalType)] = &[
    (&["DATETIME"], CanonicalType::Timestamp),
    (&["DATE"], CanonicalType::Date),
    (&["DECIMAL", "NUMERIC"], CanonicalType::Numeric),
    (&["BOOLEAN"], CanonicalType::Boolean),
    (&["TEXT"], CanonicalType::Text),
    (&["INTEGER", "INT"], CanonicalType::Integer),
    (&["REAL", "FLOAT"], CanonicalType::Float),
    (&["BLOB"], CanonicalType::Binary),
    // VARCHAR(n) widens to unbounded text.
    (&["VARCHAR"], CanonicalType::Text),
];

/// SQLite → canonical type mapper.
#[derive(Debug, Clone, Default)]
pub struct SqliteToCanonicalMapper;

impl SqliteToCanonicalMapper {
    pub fn new() -> Self {
        Self
    }
}

impl TypeMapper for SqliteToCanonicalMapper {
    fn map_type(&self, data_type: &str) -> TypeMapping {
        let upper = data_type.to_uppercase();

        for (needles, canonical) in SQLITE_RULES {
            if needles.iter().any(|n| upper.contains(n)) {
                return TypeMapping::lossless(canonical.clone());
            }
        }

        TypeMapping::lossy(
            CanonicalType::Unmapped(data_type.to_string()),
            format!("Unmapped source type '{}' passed through verbatim", data_type),
        )
    }
}
