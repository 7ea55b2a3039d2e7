//! Error types for the sync engine and ward write operations.

use std::fmt;

use thiserror::Error;

/// Phase of a sync run, carried by [`WardError::Sync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Validate,
    Read,
    Drop,
    Create,
    Load,
    Patch,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Validate => "validate",
            SyncPhase::Read => "read",
            SyncPhase::Drop => "drop",
            SyncPhase::Create => "create",
            SyncPhase::Load => "load",
            SyncPhase::Patch => "patch",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`WardError`].
///
/// Callers (chat handlers, HTTP adapters) branch on this instead of
/// matching individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InvalidArgument,
    Range,
    NotAvailable,
    SchemaMismatch,
    Storage,
    Config,
}

/// Main error type for sync and write operations.
#[derive(Error, Debug)]
pub enum WardError {
    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The admission is in a state that forbids the requested mutation.
    #[error("Cannot {action} for {status} admission: {admission_id}")]
    InvalidState {
        admission_id: String,
        status: String,
        action: &'static str,
    },

    /// An enum-valued argument is outside its fixed set, or a value is malformed.
    #[error("Invalid {field}: {value}. {expected}")]
    InvalidArgument {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// A numeric or temporal bound was violated.
    #[error("{0}")]
    Range(String),

    /// The bed is already claimed.
    #[error("Bed is not available: {bed_id} (status: {status})")]
    NotAvailable { bed_id: String, status: String },

    /// Source schema does not match the sync plan.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// PostgreSQL driver error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Connection pool error with context.
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// Unclassified storage failure (value conversion, unexpected row shape).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A sync phase failed on a specific table.
    #[error("Sync failed in {phase} phase for table {table}: {source}")]
    Sync {
        phase: SyncPhase,
        table: String,
        #[source]
        source: Box<WardError>,
    },

    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WardError {
    /// Create a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        WardError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an InvalidArgument error listing the accepted values.
    pub fn invalid_argument(field: &'static str, value: impl Into<String>, allowed: &[&str]) -> Self {
        WardError::InvalidArgument {
            field,
            value: value.into(),
            expected: format!("Must be one of {{{}}}", allowed.join(", ")),
        }
    }

    /// Create an InvalidArgument error for a value that does not parse.
    pub fn malformed(field: &'static str, value: impl Into<String>, expected: impl Into<String>) -> Self {
        WardError::InvalidArgument {
            field,
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl fmt::Display, context: impl Into<String>) -> Self {
        WardError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Wrap an error with the sync phase and table it occurred in.
    ///
    /// Errors that already carry a phase are returned unchanged.
    pub fn sync(phase: SyncPhase, table: impl Into<String>, source: WardError) -> Self {
        match source {
            already @ WardError::Sync { .. } => already,
            other => WardError::Sync {
                phase,
                table: table.into(),
                source: Box::new(other),
            },
        }
    }

    /// Classify this error into the ward error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WardError::NotFound { .. } => ErrorKind::NotFound,
            WardError::InvalidState { .. } => ErrorKind::InvalidState,
            WardError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            WardError::Range(_) => ErrorKind::Range,
            WardError::NotAvailable { .. } => ErrorKind::NotAvailable,
            WardError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            WardError::Sqlite(_)
            | WardError::Postgres(_)
            | WardError::Pool { .. }
            | WardError::Storage(_)
            | WardError::Json(_) => ErrorKind::Storage,
            WardError::Sync { source, .. } => source.kind(),
            WardError::Config(_) | WardError::Io(_) | WardError::Yaml(_) => ErrorKind::Config,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for ward operations.
pub type Result<T> = std::result::Result<T, WardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message_lists_allowed_values() {
        let err = WardError::invalid_argument("severity", "mild", &["warning", "critical"]);
        assert_eq!(
            err.to_string(),
            "Invalid severity: mild. Must be one of {warning, critical}"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_sync_wrapper_keeps_inner_kind() {
        let err = WardError::sync(
            SyncPhase::Validate,
            "bed",
            WardError::SchemaMismatch("missing table".into()),
        );
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
        assert!(err.to_string().contains("validate phase for table bed"));
    }

    #[test]
    fn test_sync_wrapper_does_not_nest() {
        let inner = WardError::sync(SyncPhase::Load, "alert", WardError::Storage("boom".into()));
        let outer = WardError::sync(SyncPhase::Patch, "admission", inner);
        match outer {
            WardError::Sync { phase, table, .. } => {
                assert_eq!(phase, SyncPhase::Load);
                assert_eq!(table, "alert");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = WardError::sync(SyncPhase::Create, "room", WardError::Storage("disk full".into()));
        let detailed = err.format_detailed();
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("disk full"));
    }
}
