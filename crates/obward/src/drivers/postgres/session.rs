//! PostgreSQL session implementation.
//!
//! Uses deadpool-postgres for connection pooling. Each transaction owns one
//! pooled connection for its whole lifetime and runs at READ COMMITTED.
//! Parameters are bound natively typed, with an explicit cast on every
//! placeholder so the server never has to guess a type.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use rust_decimal::Decimal;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Config as PgConfig, NoTls};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::core::traits::{Dialect, Session, Transaction};
use crate::core::value::{Row, SqlNullType, SqlValue};
use crate::drivers::common::placeholder::rewrite_placeholders;
use crate::drivers::common::TlsBuilder;
use crate::error::{Result, WardError};

use super::PostgresDialect;

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

type BoxedParam = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL session.
pub struct PostgresSession {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresSession {
    /// Create a new PostgreSQL session from configuration.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        // Connection options for reliability
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match TlsBuilder::new(config.ssl_mode).build()? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| WardError::pool(e, "creating PostgreSQL pool"))?
            }
            Some(tls_connector) => {
                let mgr = Manager::from_config(pg_config, tls_connector, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| WardError::pool(e, "creating PostgreSQL pool"))?
            }
        };

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| WardError::pool(e, "testing PostgreSQL connection"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            dialect: PostgresDialect::new(),
        }
    }
}

#[async_trait]
impl Session for PostgresSession {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| WardError::pool(e, "acquiring PostgreSQL connection"))?;
        client
            .batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")
            .await?;
        Ok(Box::new(PostgresTransaction {
            client: Some(client),
        }))
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// An open PostgreSQL transaction.
///
/// `client` is `None` once the transaction has been committed or rolled back.
struct PostgresTransaction {
    client: Option<Object>,
}

impl PostgresTransaction {
    fn client(&self) -> Result<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| WardError::Storage("transaction already finished".into()))
    }

    async fn finish(&mut self, statement: &str) -> Result<()> {
        let client = self
            .client
            .take()
            .ok_or_else(|| WardError::Storage("transaction already finished".into()))?;
        match client.batch_execute(statement).await {
            Ok(()) => {
                debug!("PostgreSQL transaction finished with {}", statement);
                Ok(())
            }
            Err(e) => {
                // Connection state is unknown; keep it out of the pool.
                drop(Object::take(client));
                Err(e.into())
            }
        }
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            warn!("PostgreSQL transaction dropped while open; discarding its connection");
            // Closing the connection aborts the open transaction server-side.
            drop(Object::take(client));
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<u64> {
        let (sql, boxed) = prepare(sql, params)?;
        let refs = param_refs(&boxed);
        let affected = self.client()?.execute(sql.as_str(), &refs).await?;
        Ok(affected)
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<Vec<Row>> {
        let (sql, boxed) = prepare(sql, params)?;
        let refs = param_refs(&boxed);
        let rows = self.client()?.query(sql.as_str(), &refs).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT").await
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("ROLLBACK").await
    }
}

/// Rewrite `$n` into `$n::<type>` and box each parameter as its native type.
fn prepare(sql: &str, params: &[SqlValue<'static>]) -> Result<(String, Vec<BoxedParam>)> {
    let sql = rewrite_placeholders(sql, params.len(), |n| {
        format!("${}{}", n, sql_cast_for_value(&params[n - 1]))
    })?;
    let boxed = params.iter().map(sql_value_to_param).collect();
    Ok((sql, boxed))
}

fn param_refs(boxed: &[BoxedParam]) -> Vec<&(dyn ToSql + Sync)> {
    boxed
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

fn sql_cast_for_value(value: &SqlValue<'_>) -> &'static str {
    match value {
        SqlValue::Bool(_) => "::boolean",
        SqlValue::I64(_) => "::bigint",
        SqlValue::F64(_) => "::double precision",
        SqlValue::Text(_) => "::text",
        SqlValue::Bytes(_) => "::bytea",
        SqlValue::Uuid(_) => "::uuid",
        SqlValue::Decimal(_) => "::numeric",
        SqlValue::DateTime(_) => "::timestamp",
        SqlValue::Date(_) => "::date",
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => "::boolean",
            SqlNullType::I64 => "::bigint",
            SqlNullType::F64 => "::double precision",
            SqlNullType::String => "::text",
            SqlNullType::Bytes => "::bytea",
            SqlNullType::Uuid => "::uuid",
            SqlNullType::Decimal => "::numeric",
            SqlNullType::DateTime => "::timestamp",
            SqlNullType::Date => "::date",
        },
    }
}

fn sql_value_to_param(value: &SqlValue<'static>) -> BoxedParam {
    match value {
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::I64(i) => Box::new(*i),
        SqlValue::F64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.to_string()),
        SqlValue::Bytes(b) => Box::new(b.to_vec()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Null(null_type) => match null_type {
            SqlNullType::Bool => Box::new(None::<bool>),
            SqlNullType::I64 => Box::new(None::<i64>),
            SqlNullType::F64 => Box::new(None::<f64>),
            SqlNullType::String => Box::new(None::<String>),
            SqlNullType::Bytes => Box::new(None::<Vec<u8>>),
            SqlNullType::Uuid => Box::new(None::<Uuid>),
            SqlNullType::Decimal => Box::new(None::<Decimal>),
            SqlNullType::DateTime => Box::new(None::<NaiveDateTime>),
            SqlNullType::Date => Box::new(None::<NaiveDate>),
        },
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
    let mut values = Vec::with_capacity(columns.len());
    for (idx, column) in row.columns().iter().enumerate() {
        values.push(convert_pg_row_value(row, idx, column.type_().name())?);
    }
    Ok(Row::new(columns, values))
}

/// Convert a PostgreSQL row value to SqlValue.
fn convert_pg_row_value(
    row: &tokio_postgres::Row,
    idx: usize,
    type_name: &str,
) -> Result<SqlValue<'static>> {
    fn or_null<T: Into<SqlValue<'static>>>(v: Option<T>, hint: SqlNullType) -> SqlValue<'static> {
        v.map(Into::into).unwrap_or(SqlValue::Null(hint))
    }

    let value = match type_name {
        "bool" => or_null(row.try_get::<_, Option<bool>>(idx)?, SqlNullType::Bool),
        "int2" => or_null(
            row.try_get::<_, Option<i16>>(idx)?.map(i64::from),
            SqlNullType::I64,
        ),
        "int4" => or_null(
            row.try_get::<_, Option<i32>>(idx)?.map(i64::from),
            SqlNullType::I64,
        ),
        "int8" => or_null(row.try_get::<_, Option<i64>>(idx)?, SqlNullType::I64),
        "float4" => or_null(
            row.try_get::<_, Option<f32>>(idx)?.map(f64::from),
            SqlNullType::F64,
        ),
        "float8" => or_null(row.try_get::<_, Option<f64>>(idx)?, SqlNullType::F64),
        "numeric" => or_null(
            row.try_get::<_, Option<Decimal>>(idx)?,
            SqlNullType::Decimal,
        ),
        "bytea" => or_null(row.try_get::<_, Option<Vec<u8>>>(idx)?, SqlNullType::Bytes),
        "timestamp" => or_null(
            row.try_get::<_, Option<NaiveDateTime>>(idx)?,
            SqlNullType::DateTime,
        ),
        "timestamptz" => or_null(
            row.try_get::<_, Option<DateTime<Utc>>>(idx)?
                .map(|dt| dt.naive_utc()),
            SqlNullType::DateTime,
        ),
        "date" => or_null(row.try_get::<_, Option<NaiveDate>>(idx)?, SqlNullType::Date),
        "uuid" => or_null(row.try_get::<_, Option<Uuid>>(idx)?, SqlNullType::Uuid),
        "text" | "varchar" | "bpchar" | "name" => {
            or_null(row.try_get::<_, Option<String>>(idx)?, SqlNullType::String)
        }
        other => {
            return Err(WardError::Storage(format!(
                "unsupported PostgreSQL column type '{}' in result column {}",
                other, idx
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_casts_each_placeholder() {
        let params = vec![
            SqlValue::from("B01"),
            SqlValue::I64(3),
            SqlValue::Null(SqlNullType::DateTime),
            SqlValue::Bool(false),
        ];
        let (sql, boxed) = prepare(
            "UPDATE bed SET status = $1, floor = $2, cleaned_at = $3, blocked = $4 WHERE note = '$1'",
            &params,
        )
        .unwrap();
        assert_eq!(
            sql,
            "UPDATE bed SET status = $1::text, floor = $2::bigint, \
             cleaned_at = $3::timestamp, blocked = $4::boolean WHERE note = '$1'"
        );
        assert_eq!(boxed.len(), 4);
    }

    #[test]
    fn test_prepare_rejects_unbound_placeholder() {
        let err = prepare("SELECT $2", &[SqlValue::I64(1)]).unwrap_err();
        assert!(matches!(err, WardError::Storage(_)));
    }

    #[test]
    fn test_null_casts_follow_hint() {
        assert_eq!(
            sql_cast_for_value(&SqlValue::Null(SqlNullType::Decimal)),
            "::numeric"
        );
        assert_eq!(sql_cast_for_value(&SqlValue::null_text()), "::text");
    }

    #[test]
    fn test_prepare_keeps_cast_to_unmapped_column_type() {
        let params = vec![SqlValue::from("S01"), SqlValue::from("2024-03-01 19:00:00")];
        let (sql, _) = prepare(
            "INSERT INTO \"shift\" (\"shift_id\", \"handover_at\") VALUES ($1, CAST($2 AS TIMESTAMP))",
            &params,
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"shift\" (\"shift_id\", \"handover_at\") \
             VALUES ($1::text, CAST($2::text AS TIMESTAMP))"
        );
    }
}
