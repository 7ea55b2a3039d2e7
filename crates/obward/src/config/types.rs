//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::drivers::common::SslMode;
use crate::sync::plan::{DeferredEdge, WARD_TABLE_ORDER};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (the local SQLite ward database).
    pub source: SourceConfig,

    /// Target database the ward data is mirrored into.
    pub target: TargetConfig,

    /// Sync plan configuration.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Source database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (only "sqlite" is supported).
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path to the SQLite database file.
    pub path: String,
}

/// Target database configuration, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetConfig {
    Postgres(PostgresConfig),
    Sqlite(SqliteConfig),
}

impl TargetConfig {
    pub fn db_type(&self) -> &'static str {
        match self {
            TargetConfig::Postgres(_) => "postgres",
            TargetConfig::Sqlite(_) => "sqlite",
        }
    }
}

/// PostgreSQL target configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    pub database: String,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "disable").
    #[serde(default)]
    pub ssl_mode: SslMode,

    /// Pool size (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// SQLite target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file path, or `:memory:`.
    pub path: String,
}

/// Sync plan configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Table order, leaves first (default: the ward order).
    #[serde(default = "default_tables")]
    pub tables: Vec<String>,

    /// Columns nulled during load and patched afterwards.
    #[serde(default = "default_deferred_edges")]
    pub deferred_edges: Vec<DeferredEdge>,

    /// Derive the table order from reflected foreign keys instead of `tables`.
    #[serde(default)]
    pub derive_order: bool,

    /// Rows per INSERT statement. Capped by the target's parameter limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tables: default_tables(),
            deferred_edges: default_deferred_edges(),
            derive_order: false,
            chunk_size: None,
        }
    }
}

fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_max_connections() -> usize {
    4
}

fn default_tables() -> Vec<String> {
    WARD_TABLE_ORDER.iter().map(|t| t.to_string()).collect()
}

fn default_deferred_edges() -> Vec<DeferredEdge> {
    vec![DeferredEdge::admission_current_bed()]
}
