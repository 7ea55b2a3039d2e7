//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait for reflecting and reading a SQLite
//! database file. Schema comes from `sqlite_master` plus the
//! `pragma_table_info` and `pragma_foreign_key_list` table-valued functions.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::core::identifier::{quote_ident, quote_list};
use crate::core::schema::{Column, ForeignKey, Table};
use crate::core::traits::SourceReader;
use crate::core::value::SqlValue;
use crate::error::{Result, WardError};

use super::decode_value;

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    /// Open a reader on a database file.
    pub async fn connect(path: &str) -> Result<Self> {
        let pool = super::open_pool(path).await?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| WardError::pool(e, "testing SQLite source connection"))?;

        info!("Connected to SQLite source: {}", path);
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load columns and primary key for a table.
    async fn load_columns(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT cid, name, type, "notnull", pk
            FROM pragma_table_info(?1)
            ORDER BY cid
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WardError::pool(e, "loading SQLite columns"))?;

        let mut pk: Vec<(i64, String)> = Vec::new();
        for row in rows {
            let name: String = row.try_get("name")?;
            let pk_pos: i64 = row.try_get("pk")?;
            if pk_pos > 0 {
                pk.push((pk_pos, name.clone()));
            }
            table.columns.push(Column {
                name,
                data_type: row.try_get::<Option<String>, _>("type")?.unwrap_or_default(),
                is_nullable: row.try_get::<i64, _>("notnull")? == 0,
                ordinal_pos: row.try_get::<i64, _>("cid")? as i32 + 1,
            });
        }

        pk.sort_unstable_by_key(|(pos, _)| *pos);
        table.primary_key = pk.into_iter().map(|(_, name)| name).collect();
        Ok(())
    }

    /// Load foreign keys for a table.
    async fn load_foreign_keys(&self, table: &mut Table) -> Result<()> {
        let query = r#"
            SELECT id, seq, "table", "from", "to"
            FROM pragma_foreign_key_list(?1)
            ORDER BY id, seq
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .bind(&table.name)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WardError::pool(e, "loading SQLite foreign keys"))?;

        // Group by constraint id
        let mut fk_map: BTreeMap<i64, ForeignKey> = BTreeMap::new();
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let ref_table: String = row.try_get("table")?;
            let column: String = row.try_get("from")?;
            let ref_column: Option<String> = row.try_get("to")?;

            let fk = fk_map.entry(id).or_insert_with(|| ForeignKey {
                columns: Vec::new(),
                ref_table,
                ref_columns: Vec::new(),
            });
            fk.columns.push(column);
            // A NULL target column means the referenced table's primary key.
            if let Some(ref_column) = ref_column {
                fk.ref_columns.push(ref_column);
            }
        }

        table.foreign_keys = fk_map.into_values().collect();
        Ok(())
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn extract_schema(&self) -> Result<Vec<Table>> {
        let query = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
            ORDER BY name
        "#;

        let rows: Vec<SqliteRow> = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WardError::pool(e, "extracting SQLite schema"))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let mut table = Table {
                name: row.try_get("name")?,
                columns: Vec::new(),
                primary_key: Vec::new(),
                foreign_keys: Vec::new(),
            };

            self.load_columns(&mut table).await?;
            self.load_foreign_keys(&mut table).await?;

            debug!(
                "Reflected {}: {} columns, pk ({}), {} foreign keys",
                table.name,
                table.columns.len(),
                table.primary_key.join(", "),
                table.foreign_keys.len()
            );
            tables.push(table);
        }

        info!("Extracted {} tables from SQLite source", tables.len());
        Ok(tables)
    }

    async fn read_rows(&self, table: &Table) -> Result<Vec<Vec<SqlValue<'static>>>> {
        let mut sql = format!(
            "SELECT {} FROM {}",
            quote_list(&table.column_names())?,
            quote_ident(&table.name)?
        );
        if table.has_pk() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&quote_list(&table.primary_key)?);
        }

        let rows: Vec<SqliteRow> = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| WardError::pool(e, format!("reading rows from {}", table.name)))?;

        let width = table.columns.len();
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(decode_value(row, idx)?);
            }
            out.push(values);
        }

        debug!("Read {} rows from {}", out.len(), table.name);
        Ok(out)
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
