//! Dependency-ordered database sync.
//!
//! A run reflects the source, validates the plan, reads every planned table,
//! then drops, recreates and reloads the target. Columns named by a
//! [`DeferredEdge`] are loaded as NULL and patched once every table is in
//! place, which is how circular foreign keys (admission <-> bed) are loaded.
//!
//! Each destructive phase runs in its own transaction; loading uses one
//! transaction per table. The first failure stops the run.

pub mod plan;

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, TargetConfig};
use crate::core::identifier::{quote_ident, quote_list};
use crate::core::schema::Table;
use crate::core::traits::{
    finish, ColumnMapping, Dialect, Session, SourceReader, Transaction, TypeMapper,
};
use crate::core::value::SqlValue;
use crate::dialect::{CanonicalType, SqliteToCanonicalMapper};
use crate::drivers::postgres::PostgresSession;
use crate::drivers::sqlite::{SqliteReader, SqliteSession};
use crate::error::{Result, SyncPhase, WardError};

pub use plan::{DeferredEdge, SyncPlan, WARD_TABLE_ORDER};

/// Label used for errors raised by a phase-wide statement (BEGIN/COMMIT).
const ALL_TABLES: &str = "*";

/// Rows loaded per table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: u64,
}

/// Result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    /// Tables in plan order.
    pub tables: Vec<TableSummary>,
    /// Deferred references restored in the patch phase.
    pub deferred_patched: u64,
}

impl SyncSummary {
    pub fn rows_for(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|t| t.table.eq_ignore_ascii_case(table))
            .map(|t| t.rows)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A planned table with its column mappings and source rows.
struct PreparedTable<'a> {
    table: &'a Table,
    mappings: Vec<ColumnMapping>,
    /// Indexes of deferred columns.
    deferred: Vec<usize>,
    /// Index of the single primary-key column, when the table has one.
    pk_idx: Option<usize>,
    rows: Vec<Vec<SqlValue<'static>>>,
}

/// A deferred reference waiting to be written back.
struct PendingPatch {
    table: String,
    column: String,
    pk_column: String,
    pk_value: SqlValue<'static>,
    value: SqlValue<'static>,
}

/// Copies a source database into a target session following a [`SyncPlan`].
pub struct SyncEngine<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn Session,
    mapper: &'a dyn TypeMapper,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn Session,
        mapper: &'a dyn TypeMapper,
    ) -> Self {
        Self {
            source,
            target,
            mapper,
        }
    }

    /// Reflect the source and derive a plan from its foreign keys.
    pub async fn derive_plan(&self, deferred: Vec<DeferredEdge>) -> Result<SyncPlan> {
        let reflected = self
            .source
            .extract_schema()
            .await
            .map_err(|e| WardError::sync(SyncPhase::Validate, ALL_TABLES, e))?;
        SyncPlan::from_tables(&reflected, deferred)
            .map_err(|e| WardError::sync(SyncPhase::Validate, ALL_TABLES, e))
    }

    /// Run the full drop/create/load/patch cycle.
    pub async fn run(&self, plan: &SyncPlan) -> Result<SyncSummary> {
        let started = Instant::now();
        let dialect = self.target.dialect();
        info!(
            "Starting sync {} -> {} ({} tables, {} deferred edges)",
            self.source.db_type(),
            dialect.name(),
            plan.tables.len(),
            plan.deferred.len()
        );

        let reflected = self
            .source
            .extract_schema()
            .await
            .map_err(|e| WardError::sync(SyncPhase::Validate, ALL_TABLES, e))?;
        let planned = self.validate(plan, &reflected)?;

        let prepared = self.read_all(plan, planned).await?;
        self.drop_tables(dialect, &prepared).await?;
        self.create_tables(dialect, &prepared).await?;

        let chunk_rows = plan.chunk_size;
        let mut tables = Vec::with_capacity(prepared.len());
        let mut patches = Vec::new();
        for table in &prepared {
            let rows = self
                .load_table(dialect, table, chunk_rows, &mut patches)
                .await?;
            tables.push(TableSummary {
                table: table.table.name.clone(),
                rows,
            });
        }

        let deferred_patched = self.patch(&patches).await?;

        let summary = SyncSummary {
            success: true,
            tables,
            deferred_patched,
        };
        info!(
            "Sync complete: {} rows in {} tables, {} deferred references patched ({:.2}s)",
            summary.total_rows(),
            summary.tables.len(),
            summary.deferred_patched,
            started.elapsed().as_secs_f64()
        );
        Ok(summary)
    }

    fn validate<'t>(&self, plan: &SyncPlan, reflected: &'t [Table]) -> Result<Vec<&'t Table>> {
        let planned = plan
            .validate(reflected)
            .map_err(|e| WardError::sync(SyncPhase::Validate, ALL_TABLES, e))?;

        for table in reflected {
            if !plan
                .tables
                .iter()
                .any(|t| t.eq_ignore_ascii_case(&table.name))
            {
                warn!("Skipping source table '{}': not in sync plan", table.name);
            }
        }

        for table in &planned {
            for col in &table.columns {
                quote_ident(&col.name)
                    .map_err(|e| WardError::sync(SyncPhase::Validate, &table.name, e))?;
            }
        }
        Ok(planned)
    }

    async fn read_all<'t>(
        &self,
        plan: &SyncPlan,
        planned: Vec<&'t Table>,
    ) -> Result<Vec<PreparedTable<'t>>> {
        let mut prepared = Vec::with_capacity(planned.len());

        for table in planned {
            let mappings: Vec<ColumnMapping> = table
                .columns
                .iter()
                .map(|c| self.mapper.map_column(c))
                .collect();
            for m in &mappings {
                if let Some(w) = &m.warning {
                    warn!("{}.{}: {}", table.name, m.name, w);
                }
            }

            let deferred: Vec<usize> = table
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| plan.is_deferred(&table.name, &c.name))
                .map(|(i, _)| i)
                .collect();
            let pk_idx = if table.has_single_pk() {
                table.column_index(&table.primary_key[0])
            } else {
                None
            };

            let rows = self
                .source
                .read_rows(table)
                .await
                .map_err(|e| WardError::sync(SyncPhase::Read, &table.name, e))?;
            info!("Read {} rows from {}", rows.len(), table.name);

            prepared.push(PreparedTable {
                table,
                mappings,
                deferred,
                pk_idx,
                rows,
            });
        }

        Ok(prepared)
    }

    async fn drop_tables(&self, dialect: &dyn Dialect, prepared: &[PreparedTable<'_>]) -> Result<()> {
        let mut tx = self.begin(SyncPhase::Drop).await?;
        let result: Result<()> = async {
            for p in prepared.iter().rev() {
                let name = &p.table.name;
                let sql = dialect.drop_table_sql(&quote_ident(name)?);
                debug!("{}", sql);
                tx.execute(&sql, &[])
                    .await
                    .map_err(|e| WardError::sync(SyncPhase::Drop, name, e))?;
            }
            Ok(())
        }
        .await;
        finish(tx, result)
            .await
            .map_err(|e| WardError::sync(SyncPhase::Drop, ALL_TABLES, e))?;
        info!("Dropped {} target tables", prepared.len());
        Ok(())
    }

    async fn create_tables(
        &self,
        dialect: &dyn Dialect,
        prepared: &[PreparedTable<'_>],
    ) -> Result<()> {
        let mut tx = self.begin(SyncPhase::Create).await?;
        let result: Result<()> = async {
            for p in prepared {
                let sql = create_table_sql(dialect, p)
                    .map_err(|e| WardError::sync(SyncPhase::Create, &p.table.name, e))?;
                debug!("{}", sql);
                tx.execute(&sql, &[])
                    .await
                    .map_err(|e| WardError::sync(SyncPhase::Create, &p.table.name, e))?;
                info!("Created table {}", p.table.name);
            }
            Ok(())
        }
        .await;
        finish(tx, result)
            .await
            .map_err(|e| WardError::sync(SyncPhase::Create, ALL_TABLES, e))
    }

    async fn load_table(
        &self,
        dialect: &dyn Dialect,
        p: &PreparedTable<'_>,
        chunk_rows: Option<usize>,
        patches: &mut Vec<PendingPatch>,
    ) -> Result<u64> {
        let name = &p.table.name;
        let wrap = |e| WardError::sync(SyncPhase::Load, name, e);

        let mut rows = Vec::with_capacity(p.rows.len());
        let mut table_patches = Vec::new();
        for source_row in &p.rows {
            let mut row = Vec::with_capacity(source_row.len());
            for (i, value) in source_row.iter().enumerate() {
                let mapping = p.mappings.get(i).ok_or_else(|| {
                    wrap(WardError::Storage(format!(
                        "row has {} values but table has {} columns",
                        source_row.len(),
                        p.mappings.len()
                    )))
                })?;
                let coerced = mapping.canonical.coerce(value.clone()).map_err(|e| {
                    wrap(WardError::Storage(format!(
                        "column '{}' of row {}: {}",
                        mapping.name,
                        row_key(p.table, source_row),
                        storage_message(e)
                    )))
                })?;
                row.push(coerced);
            }

            for &col in &p.deferred {
                let canonical = &p.mappings[col].canonical;
                let original =
                    std::mem::replace(&mut row[col], SqlValue::Null(canonical.null_type()));
                if original.is_null() {
                    continue;
                }
                let pk_idx = p.pk_idx.ok_or_else(|| {
                    wrap(WardError::SchemaMismatch(format!(
                        "table '{}' has no single-column primary key",
                        name
                    )))
                })?;
                table_patches.push(PendingPatch {
                    table: name.clone(),
                    column: p.mappings[col].name.clone(),
                    pk_column: p.mappings[pk_idx].name.clone(),
                    pk_value: row[pk_idx].clone(),
                    value: original,
                });
            }
            rows.push(row);
        }

        let per_stmt = rows_per_statement(dialect, p.mappings.len(), chunk_rows);

        let mut tx = self.begin(SyncPhase::Load).await.map_err(wrap)?;
        let result: Result<u64> = async {
            let mut inserted = 0u64;
            for chunk in rows.chunks(per_stmt) {
                let (sql, params) = build_insert_sql(dialect, name, &p.mappings, chunk)?;
                inserted += tx.execute(&sql, &params).await?;
                debug!("{}: inserted {} rows", name, inserted);
            }
            Ok(inserted)
        }
        .await;
        let inserted = finish(tx, result).await.map_err(wrap)?;

        if !table_patches.is_empty() {
            info!(
                "Loaded {} rows into {} ({} deferred references)",
                inserted,
                name,
                table_patches.len()
            );
        } else {
            info!("Loaded {} rows into {}", inserted, name);
        }
        patches.extend(table_patches);
        Ok(rows.len() as u64)
    }

    async fn patch(&self, patches: &[PendingPatch]) -> Result<u64> {
        if patches.is_empty() {
            return Ok(0);
        }

        let mut tx = self.begin(SyncPhase::Patch).await?;
        let result: Result<u64> = async {
            let mut patched = 0u64;
            for p in patches {
                let wrap = |e| WardError::sync(SyncPhase::Patch, &p.table, e);
                let sql = format!(
                    "UPDATE {} SET {} = $1 WHERE {} = $2",
                    quote_ident(&p.table).map_err(wrap)?,
                    quote_ident(&p.column).map_err(wrap)?,
                    quote_ident(&p.pk_column).map_err(wrap)?
                );
                patched += tx
                    .execute(&sql, &[p.value.clone(), p.pk_value.clone()])
                    .await
                    .map_err(wrap)?;
            }
            Ok(patched)
        }
        .await;
        let patched = finish(tx, result)
            .await
            .map_err(|e| WardError::sync(SyncPhase::Patch, ALL_TABLES, e))?;
        info!("Patched {} deferred references", patched);
        Ok(patched)
    }

    async fn begin(&self, phase: SyncPhase) -> Result<Box<dyn Transaction>> {
        self.target
            .begin()
            .await
            .map_err(|e| WardError::sync(phase, ALL_TABLES, e))
    }
}

fn create_table_sql(dialect: &dyn Dialect, p: &PreparedTable<'_>) -> Result<String> {
    let mut defs = Vec::with_capacity(p.mappings.len() + 1);
    for (i, m) in p.mappings.iter().enumerate() {
        let nullable = m.is_nullable || p.deferred.contains(&i);
        defs.push(format!(
            "{} {}{}",
            quote_ident(&m.name)?,
            dialect.native_type(&m.canonical),
            if nullable { "" } else { " NOT NULL" }
        ));
    }
    if p.table.has_pk() {
        defs.push(format!("PRIMARY KEY ({})", quote_list(&p.table.primary_key)?));
    }
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(&p.table.name)?,
        defs.join(", ")
    ))
}

/// Primary-key values of a source row, for error messages.
fn row_key(table: &Table, row: &[SqlValue<'_>]) -> String {
    let values: Vec<String> = table
        .primary_key
        .iter()
        .filter_map(|pk| table.column_index(pk))
        .filter_map(|i| row.get(i))
        .map(SqlValue::to_display)
        .collect();
    if values.is_empty() {
        "without primary key".to_string()
    } else {
        format!("({})", values.join(", "))
    }
}

fn storage_message(err: WardError) -> String {
    match err {
        WardError::Storage(msg) => msg,
        other => other.to_string(),
    }
}

/// Rows per INSERT so that no statement exceeds the dialect's parameter limit.
fn rows_per_statement(dialect: &dyn Dialect, columns: usize, configured: Option<usize>) -> usize {
    let limit = (dialect.max_params() / columns.max(1)).max(1);
    configured.map_or(limit, |c| c.clamp(1, limit))
}

/// Build a multi-row INSERT with `$n` placeholders.
///
/// Placeholders for unmapped columns are wrapped by the dialect so the value
/// converts to the column's verbatim type.
fn build_insert_sql(
    dialect: &dyn Dialect,
    table: &str,
    mappings: &[ColumnMapping],
    rows: &[Vec<SqlValue<'static>>],
) -> Result<(String, Vec<SqlValue<'static>>)> {
    let cols: Vec<String> = mappings.iter().map(|m| m.name.clone()).collect();
    let unmapped: Vec<Option<String>> = mappings
        .iter()
        .map(|m| match &m.canonical {
            CanonicalType::Unmapped(_) => Some(dialect.native_type(&m.canonical)),
            _ => None,
        })
        .collect();

    let mut placeholders = Vec::with_capacity(rows.len());
    let mut params = Vec::with_capacity(rows.len() * cols.len());
    let mut idx = 1;

    for row in rows {
        let row_placeholders: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(col, _)| {
                let p = format!("${}", idx);
                idx += 1;
                match unmapped.get(col) {
                    Some(Some(native)) => dialect.unmapped_value_sql(&p, native),
                    _ => p,
                }
            })
            .collect();
        placeholders.push(format!("({})", row_placeholders.join(", ")));
        params.extend(row.iter().cloned());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        quote_ident(table)?,
        quote_list(&cols)?,
        placeholders.join(", ")
    );
    Ok((sql, params))
}

/// Connect source and target from configuration and run the configured plan.
///
/// Resets the target database to a copy of the local ward database.
pub async fn run_from_config(config: &Config) -> Result<SyncSummary> {
    config.validate()?;

    let source = SqliteReader::connect(&config.source.path).await?;
    let target: Box<dyn Session> = match &config.target {
        TargetConfig::Postgres(pg) => Box::new(PostgresSession::connect(pg).await?),
        TargetConfig::Sqlite(lite) => Box::new(SqliteSession::connect(&lite.path).await?),
    };
    let mapper = SqliteToCanonicalMapper::new();
    let engine = SyncEngine::new(&source, target.as_ref(), &mapper);

    let result: Result<SyncSummary> = async {
        let plan = if config.sync.derive_order {
            let derived = engine.derive_plan(config.sync.deferred_edges.clone()).await?;
            match config.sync.chunk_size {
                Some(chunk) => derived.with_chunk_size(chunk),
                None => derived,
            }
        } else {
            config.sync.declared_plan()
        };
        engine.run(&plan).await
    }
    .await;

    source.close().await;
    target.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Column;
    use crate::drivers::{PostgresDialect, SqliteDialect};

    fn prepared(table: &Table, deferred: Vec<usize>) -> PreparedTable<'_> {
        let mapper = SqliteToCanonicalMapper::new();
        PreparedTable {
            table,
            mappings: table.columns.iter().map(|c| mapper.map_column(c)).collect(),
            deferred,
            pk_idx: Some(0),
            rows: vec![],
        }
    }

    fn admission() -> Table {
        Table {
            name: "admission".into(),
            columns: vec![
                Column::new("admission_id", "VARCHAR(20)", false),
                Column::new("admit_time", "DATETIME", false),
                Column::new("current_bed_id", "VARCHAR(20)", false),
                Column::new("predicted_los_hours", "INTEGER", true),
            ],
            primary_key: vec!["admission_id".into()],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_create_table_sql_postgres() {
        let t = admission();
        let sql = create_table_sql(&PostgresDialect::new(), &prepared(&t, vec![2])).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"admission\" (\"admission_id\" text NOT NULL, \
             \"admit_time\" timestamp NOT NULL, \"current_bed_id\" text, \
             \"predicted_los_hours\" integer, PRIMARY KEY (\"admission_id\"))"
        );
    }

    #[test]
    fn test_create_table_sql_sqlite() {
        let t = admission();
        let sql = create_table_sql(&SqliteDialect::new(), &prepared(&t, vec![])).unwrap();
        assert!(sql.contains("\"admit_time\" DATETIME NOT NULL"));
        assert!(sql.contains("\"current_bed_id\" TEXT NOT NULL"));
    }

    #[test]
    fn test_build_insert_sql_numbers_placeholders() {
        let t = Table {
            name: "bed".into(),
            columns: vec![
                Column::new("bed_id", "VARCHAR(20)", false),
                Column::new("status", "TEXT", true),
            ],
            primary_key: vec!["bed_id".into()],
            foreign_keys: vec![],
        };
        let p = prepared(&t, vec![]);
        let rows = vec![
            vec![SqlValue::text_owned("B01"), SqlValue::text_owned("available")],
            vec![SqlValue::text_owned("B02"), SqlValue::null_text()],
        ];
        let (sql, params) =
            build_insert_sql(&PostgresDialect::new(), "bed", &p.mappings, &rows).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"bed\" (\"bed_id\", \"status\") VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(params.len(), 4);
        assert!(params[3].is_null());
    }

    #[test]
    fn test_rows_per_statement_respects_limit() {
        let pg = PostgresDialect::new();
        assert_eq!(rows_per_statement(&pg, 10, None), pg.max_params() / 10);
        assert_eq!(rows_per_statement(&pg, 10, Some(50)), 50);
        assert_eq!(
            rows_per_statement(&pg, 10, Some(usize::MAX)),
            pg.max_params() / 10
        );
        assert_eq!(rows_per_statement(&pg, 0, Some(0)), 1);
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = SyncSummary {
            success: true,
            tables: vec![TableSummary {
                table: "bed".into(),
                rows: 2,
            }],
            deferred_patched: 1,
        };
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["tables"][0]["table"], "bed");
        assert_eq!(json["tables"][0]["rows"], 2);
        assert_eq!(summary.rows_for("BED"), Some(2));
    }

    #[test]
    fn test_unmapped_type_rendered_verbatim() {
        let t = Table {
            name: "room".into(),
            columns: vec![Column::new("shape", "GEOMETRY", true)],
            primary_key: vec![],
            foreign_keys: vec![],
        };
        let p = prepared(&t, vec![]);
        assert_eq!(
            p.mappings[0].canonical,
            CanonicalType::Unmapped("GEOMETRY".into())
        );
        let sql = create_table_sql(&PostgresDialect::new(), &p).unwrap();
        assert_eq!(sql, "CREATE TABLE \"room\" (\"shape\" GEOMETRY)");
    }

    #[test]
    fn test_unmapped_values_cast_on_postgres_only() {
        let t = Table {
            name: "shift".into(),
            columns: vec![
                Column::new("shift_id", "VARCHAR(20)", false),
                Column::new("handover_at", "TIMESTAMP", true),
            ],
            primary_key: vec!["shift_id".into()],
            foreign_keys: vec![],
        };
        let p = prepared(&t, vec![]);
        let rows = vec![vec![
            SqlValue::text_owned("S01"),
            SqlValue::text_owned("2024-03-01 19:00:00"),
        ]];

        let (sql, _) =
            build_insert_sql(&PostgresDialect::new(), "shift", &p.mappings, &rows).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"shift\" (\"shift_id\", \"handover_at\") \
             VALUES ($1, CAST($2 AS TIMESTAMP))"
        );

        let (sql, _) =
            build_insert_sql(&SqliteDialect::new(), "shift", &p.mappings, &rows).unwrap();
        assert!(sql.ends_with("VALUES ($1, $2)"), "{sql}");
    }
}
