//! Configuration validation.

use std::collections::HashSet;

use super::{Config, TargetConfig};
use crate::core::identifier::validate_identifier;
use crate::error::{Result, WardError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "sqlite" {
        return Err(WardError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.path.is_empty() {
        return Err(WardError::Config("source.path is required".into()));
    }

    // Target validation
    match &config.target {
        TargetConfig::Postgres(pg) => {
            if pg.host.is_empty() {
                return Err(WardError::Config("target.host is required".into()));
            }
            if pg.database.is_empty() {
                return Err(WardError::Config("target.database is required".into()));
            }
            if pg.user.is_empty() {
                return Err(WardError::Config("target.user is required".into()));
            }
            if pg.max_connections == 0 {
                return Err(WardError::Config(
                    "target.max_connections must be at least 1".into(),
                ));
            }
        }
        TargetConfig::Sqlite(lite) => {
            if lite.path.is_empty() {
                return Err(WardError::Config("target.path is required".into()));
            }
            if lite.path == config.source.path && lite.path != ":memory:" {
                return Err(WardError::Config(
                    "source and target cannot be the same database".into(),
                ));
            }
        }
    }

    // Sync plan validation
    let sync = &config.sync;
    if sync.tables.is_empty() && !sync.derive_order {
        return Err(WardError::Config(
            "sync.tables must not be empty unless sync.derive_order is set".into(),
        ));
    }
    let mut seen = HashSet::new();
    for table in &sync.tables {
        validate_identifier(table).map_err(|e| WardError::Config(e.to_string()))?;
        if !seen.insert(table.to_lowercase()) {
            return Err(WardError::Config(format!(
                "sync.tables lists '{}' more than once",
                table
            )));
        }
    }
    for edge in &sync.deferred_edges {
        for name in [&edge.table, &edge.column, &edge.ref_table] {
            validate_identifier(name).map_err(|e| WardError::Config(e.to_string()))?;
        }
    }
    if let Some(0) = sync.chunk_size {
        return Err(WardError::Config(
            "sync.chunk_size must be at least 1".into(),
        ));
    }

    Ok(())
}
