//! SQLite session implementation.
//!
//! Transactions wrap `sqlx::Transaction`; `$n` placeholders become `?n`,
//! which SQLite binds by index.

use async_trait::async_trait;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool};
use sqlx::query::Query;
use tracing::{debug, info};

use crate::core::traits::{Dialect, Session, Transaction};
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::placeholder::rewrite_placeholders;
use crate::error::{Result, WardError};

use super::{decode_row, SqliteDialect};

/// SQLite session.
pub struct SqliteSession {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteSession {
    /// Open a session on a database file, or on a private in-memory database for `:memory:`.
    pub async fn connect(path: &str) -> Result<Self> {
        let pool = super::open_pool(path).await?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| WardError::pool(e, "testing SQLite target connection"))?;

        info!("Connected to SQLite target: {}", path);
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            dialect: SqliteDialect::new(),
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Session for SqliteSession {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    /// Begin with the write lock already held, so a read-check-write sequence
    /// cannot interleave with another writer. A second writer waits up to the
    /// pool's busy timeout.
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| WardError::pool(e, "beginning SQLite transaction"))?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// An open SQLite transaction. Rolled back by sqlx if dropped unfinished.
struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

fn native_sql(sql: &str, param_count: usize) -> Result<String> {
    rewrite_placeholders(sql, param_count, |n| format!("?{}", n))
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q SqlValue<'static>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null(_) => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::I64(i) => query.bind(*i),
        SqlValue::F64(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(&**s),
        SqlValue::Bytes(b) => query.bind(&**b),
        // No native uuid or decimal storage; both travel as text.
        SqlValue::Uuid(u) => query.bind(u.to_string()),
        SqlValue::Decimal(d) => query.bind(d.to_string()),
        SqlValue::DateTime(dt) => query.bind(*dt),
        SqlValue::Date(d) => query.bind(*d),
    }
}

fn build_query<'q>(
    sql: &'q str,
    params: &'q [SqlValue<'static>],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value))
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<u64> {
        let sql = native_sql(sql, params.len())?;
        let result = build_query(&sql, params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue<'static>]) -> Result<Vec<Row>> {
        let sql = native_sql(sql, params.len())?;
        let rows = build_query(&sql, params).fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        debug!("SQLite transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        debug!("SQLite transaction rolled back");
        Ok(())
    }
}
