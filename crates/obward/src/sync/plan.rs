//! Sync plans: table load order plus deferred (circular) foreign-key columns.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::identifier::validate_identifier;
use crate::core::schema::Table;
use crate::error::{Result, WardError};

/// Ward tables, leaves first.
pub const WARD_TABLE_ORDER: &[&str] = &[
    "patient",
    "provider",
    "room",
    "ob_profile",
    "shift",
    "admission",
    "bed",
    "labor_progress",
    "vital_sign",
    "medical_order",
    "alert",
];

/// A referencing column that is nulled during bulk load and patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredEdge {
    /// Table holding the referencing column.
    pub table: String,
    /// The referencing column.
    pub column: String,
    /// Referenced table.
    pub ref_table: String,
}

impl DeferredEdge {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            ref_table: ref_table.into(),
        }
    }

    /// `admission.current_bed_id -> bed`, the ward schema's admission/bed cycle.
    pub fn admission_current_bed() -> Self {
        Self::new("admission", "current_bed_id", "bed")
    }

    fn matches(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

/// Ordered table list and deferred edges driving one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    /// Tables in load order; dropped in reverse.
    pub tables: Vec<String>,
    pub deferred: Vec<DeferredEdge>,
    /// Rows per INSERT statement; `None` fills up to the target's parameter limit.
    pub chunk_size: Option<usize>,
}

impl SyncPlan {
    pub fn new(tables: Vec<String>, deferred: Vec<DeferredEdge>) -> Self {
        Self {
            tables,
            deferred,
            chunk_size: None,
        }
    }

    /// The declared ward plan.
    pub fn ward_default() -> Self {
        Self::new(
            WARD_TABLE_ORDER.iter().map(|t| t.to_string()).collect(),
            vec![DeferredEdge::admission_current_bed()],
        )
    }

    pub fn with_chunk_size(mut self, rows: usize) -> Self {
        self.chunk_size = Some(rows.max(1));
        self
    }

    /// Derive a load order from reflected foreign keys.
    ///
    /// Self-references and deferred edges are ignored, as are references to
    /// tables outside `tables`. Ties are broken alphabetically so the order is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `WardError::SchemaMismatch` naming the tables of any remaining cycle.
    pub fn from_tables(tables: &[Table], deferred: Vec<DeferredEdge>) -> Result<Self> {
        let names: BTreeMap<String, &Table> = tables
            .iter()
            .map(|t| (t.name.to_lowercase(), t))
            .collect();

        // table -> tables it must come after
        let mut pending: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (key, table) in &names {
            let deps = table
                .foreign_keys
                .iter()
                .filter(|fk| !is_deferred_fk(&deferred, &table.name, &fk.columns))
                .map(|fk| fk.ref_table.to_lowercase())
                .filter(|r| r != key && names.contains_key(r))
                .collect();
            pending.insert(key.as_str(), deps);
        }

        let mut order = Vec::with_capacity(names.len());
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .find(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name);

            let Some(next) = ready else {
                let cycle: Vec<&str> = pending.keys().copied().collect();
                return Err(WardError::SchemaMismatch(format!(
                    "foreign-key cycle among tables [{}]; declare a deferred edge to break it",
                    cycle.join(", ")
                )));
            };

            pending.remove(next);
            for deps in pending.values_mut() {
                deps.remove(next);
            }
            if let Some(table) = names.get(next) {
                order.push(table.name.clone());
            }
        }

        Ok(Self::new(order, deferred))
    }

    /// Check this plan against the reflected source schema.
    ///
    /// Returns the reflected tables in plan order.
    pub fn validate<'a>(&self, reflected: &'a [Table]) -> Result<Vec<&'a Table>> {
        let by_name: HashMap<String, &Table> = reflected
            .iter()
            .map(|t| (t.name.to_lowercase(), t))
            .collect();

        let mut planned = Vec::with_capacity(self.tables.len());
        for name in &self.tables {
            validate_identifier(name)?;
            let table = by_name.get(&name.to_lowercase()).ok_or_else(|| {
                WardError::SchemaMismatch(format!("table '{}' not found in source", name))
            })?;
            planned.push(*table);
        }

        for edge in &self.deferred {
            self.validate_edge(edge, &planned)?;
        }

        let position: HashMap<String, usize> = planned
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.to_lowercase(), i))
            .collect();

        for (i, table) in planned.iter().enumerate() {
            for fk in &table.foreign_keys {
                if is_deferred_fk(&self.deferred, &table.name, &fk.columns) {
                    continue;
                }
                match position.get(&fk.ref_table.to_lowercase()) {
                    Some(&p) if p > i => {
                        return Err(WardError::SchemaMismatch(format!(
                            "table '{}' is ordered before '{}', which it references through ({})",
                            table.name,
                            fk.ref_table,
                            fk.columns.join(", ")
                        )));
                    }
                    _ => {}
                }
            }
        }

        Ok(planned)
    }

    fn validate_edge(&self, edge: &DeferredEdge, planned: &[&Table]) -> Result<()> {
        let find = |name: &str| {
            planned
                .iter()
                .find(|t| t.name.eq_ignore_ascii_case(name))
                .copied()
        };

        let table = find(&edge.table).ok_or_else(|| {
            WardError::SchemaMismatch(format!(
                "deferred edge names unplanned table '{}'",
                edge.table
            ))
        })?;
        if table.column(&edge.column).is_none() {
            return Err(WardError::SchemaMismatch(format!(
                "deferred edge names unknown column '{}.{}'",
                edge.table, edge.column
            )));
        }
        if find(&edge.ref_table).is_none() {
            return Err(WardError::SchemaMismatch(format!(
                "deferred edge references unplanned table '{}'",
                edge.ref_table
            )));
        }
        if !table.has_single_pk() {
            return Err(WardError::SchemaMismatch(format!(
                "table '{}' needs a single-column primary key to defer '{}'",
                edge.table, edge.column
            )));
        }
        Ok(())
    }

    /// Whether `table.column` is nulled during load.
    pub fn is_deferred(&self, table: &str, column: &str) -> bool {
        self.deferred.iter().any(|e| e.matches(table, column))
    }
}

impl Default for SyncPlan {
    fn default() -> Self {
        Self::ward_default()
    }
}

fn is_deferred_fk(deferred: &[DeferredEdge], table: &str, columns: &[String]) -> bool {
    columns.len() == 1 && deferred.iter().any(|e| e.matches(table, &columns[0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, ForeignKey};

    fn table(name: &str, refs: &[(&str, &str)]) -> Table {
        let mut columns = vec![Column::new(format!("{name}_id"), "TEXT", false)];
        let mut foreign_keys = Vec::new();
        for (col, target) in refs {
            columns.push(Column::new(*col, "TEXT", true));
            foreign_keys.push(ForeignKey {
                columns: vec![col.to_string()],
                ref_table: target.to_string(),
                ref_columns: vec![format!("{target}_id")],
            });
        }
        Table {
            name: name.to_string(),
            columns,
            primary_key: vec![format!("{name}_id")],
            foreign_keys,
        }
    }

    fn ward_subset() -> Vec<Table> {
        vec![
            table("bed", &[("room_id", "room"), ("current_admission_id", "admission")]),
            table("alert", &[("admission_id", "admission")]),
            table(
                "admission",
                &[("patient_id", "patient"), ("current_bed_id", "bed")],
            ),
            table("patient", &[]),
            table("room", &[]),
        ]
    }

    #[test]
    fn test_derived_order_respects_dependencies() {
        let plan = SyncPlan::from_tables(
            &ward_subset(),
            vec![DeferredEdge::admission_current_bed()],
        )
        .unwrap();
        assert_eq!(
            plan.tables,
            vec!["patient", "admission", "alert", "room", "bed"]
        );
        plan.validate(&ward_subset()).unwrap();
    }

    #[test]
    fn test_cycle_without_deferred_edge_is_rejected() {
        let err = SyncPlan::from_tables(&ward_subset(), vec![]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("admission"));
        assert!(msg.contains("bed"));
        assert!(!msg.contains("patient"));
    }

    #[test]
    fn test_self_reference_is_ignored() {
        let tables = vec![table("admission", &[("transferred_from", "admission")])];
        let plan = SyncPlan::from_tables(&tables, vec![]).unwrap();
        assert_eq!(plan.tables, vec!["admission"]);
    }

    #[test]
    fn test_missing_table_is_schema_mismatch() {
        let plan = SyncPlan::new(vec!["patient".into(), "shift".into()], vec![]);
        let err = plan.validate(&ward_subset()).unwrap_err();
        assert!(matches!(err, WardError::SchemaMismatch(ref m) if m.contains("shift")));
    }

    #[test]
    fn test_declared_order_violation() {
        let plan = SyncPlan::new(
            vec!["alert".into(), "patient".into(), "admission".into()],
            vec![],
        );
        let tables = vec![
            table("alert", &[("admission_id", "admission")]),
            table("admission", &[("patient_id", "patient")]),
            table("patient", &[]),
        ];
        let err = plan.validate(&tables).unwrap_err();
        assert!(err.to_string().contains("'alert' is ordered before 'admission'"));
    }

    #[test]
    fn test_deferred_edge_unknown_column() {
        let plan = SyncPlan::new(
            vec!["patient".into(), "admission".into(), "room".into(), "bed".into()],
            vec![DeferredEdge::new("admission", "bed_ref", "bed")],
        );
        let err = plan.validate(&ward_subset()).unwrap_err();
        assert!(err.to_string().contains("admission.bed_ref"));
    }

    #[test]
    fn test_deferred_edge_requires_single_pk() {
        let mut tables = ward_subset();
        for t in tables.iter_mut().filter(|t| t.name == "admission") {
            t.primary_key.push("patient_id".into());
        }
        let plan = SyncPlan::new(
            vec!["patient".into(), "admission".into(), "room".into(), "bed".into()],
            vec![DeferredEdge::admission_current_bed()],
        );
        let err = plan.validate(&tables).unwrap_err();
        assert!(err.to_string().contains("single-column primary key"));
    }

    #[test]
    fn test_is_deferred_case_insensitive() {
        let plan = SyncPlan::ward_default();
        assert!(plan.is_deferred("Admission", "CURRENT_BED_ID"));
        assert!(!plan.is_deferred("bed", "current_admission_id"));
    }
}
