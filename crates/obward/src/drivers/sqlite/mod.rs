//! SQLite driver.
//!
//! - [`SqliteDialect`]: SQL syntax strategy for SQLite
//! - [`SqliteReader`]: source reader (schema reflection through `pragma_*` functions)
//! - [`SqliteSession`]: transactional session used as a sync target or for ward writes
//!
//! Uses sqlx for pooling. Values are decoded by storage class, since SQLite
//! column types are only affinities.

mod dialect;
mod reader;
mod session;

pub use dialect::SqliteDialect;
pub use reader::SqliteReader;
pub use session::SqliteSession;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};
use tracing::info;

use crate::core::value::{Row, SqlNullType, SqlValue};
use crate::error::{Result, WardError};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pool size for file-backed databases.
const FILE_POOL_SIZE: u32 = 4;

/// How long a connection waits on another writer's lock before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Open a pool on a database file, or on a private in-memory database for `:memory:`.
///
/// An in-memory database lives as long as its single connection, so that
/// connection is never recycled.
pub async fn open_pool(path: &str) -> Result<SqlitePool> {
    let in_memory = path == ":memory:";
    let options = if in_memory {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
    }
    // Match SQLite's own default: foreign keys are declared, not enforced.
    .foreign_keys(false)
    .busy_timeout(BUSY_TIMEOUT);

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(FILE_POOL_SIZE)
    };

    let pool = pool_options
        .acquire_timeout(POOL_CONNECTION_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| WardError::pool(e, format!("opening SQLite database '{}'", path)))?;

    info!("Opened SQLite database: {}", path);
    Ok(pool)
}

/// Decode a full result row.
pub(crate) fn decode_row(row: &SqliteRow) -> Result<Row> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut values = Vec::with_capacity(columns.len());
    for idx in 0..columns.len() {
        values.push(decode_value(row, idx)?);
    }
    Ok(Row::new(columns, values))
}

/// Decode one value by its storage class.
pub(crate) fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue<'static>> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null(SqlNullType::String));
    }
    let storage = raw.type_info().name().to_string();

    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => SqlValue::I64(row.try_get_unchecked::<i64, _>(idx)?),
        "REAL" => SqlValue::F64(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => SqlValue::from(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        _ => match row.try_get_unchecked::<String, _>(idx) {
            Ok(s) => SqlValue::from(s),
            Err(_) => SqlValue::from(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        },
    };
    Ok(value)
}
