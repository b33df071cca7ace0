//! Declarative projections deriving edge (or node) batches from the
//! foreign-key columns of another batch
//!
//! A projection selects and renames columns. Rows whose key columns are null
//! are dropped, surviving rows keep their source order, and no value is ever
//! invented.

use crate::batch::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{SchemaRegistry, TableSpec, TypedColumn, FROM_COLUMN, TO_COLUMN};
use crate::source::coerce::coerce_value;
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ProjectionRule {
    pub name: String,
    pub target_table: String,
    columns: Arc<[TypedColumn]>,
    /// Source column feeding each target column
    mappings: Vec<Option<String>>,
    /// Target columns that encode a foreign key; a null here drops the row
    keys: Vec<usize>,
    distinct: bool,
}

impl ProjectionRule {
    /// Rule producing batches with an explicit column layout
    pub fn new(
        name: impl Into<String>,
        target_table: impl Into<String>,
        columns: impl Into<Arc<[TypedColumn]>>,
    ) -> Self {
        let columns = columns.into();
        Self {
            name: name.into(),
            target_table: target_table.into(),
            mappings: vec![None; columns.len()],
            columns,
            keys: Vec::new(),
            distinct: false,
        }
    }

    /// Rule producing batches loadable into a declared table. Edge tables key
    /// on `from`/`to`, node tables on their primary key.
    pub fn for_table(
        name: impl Into<String>,
        registry: &SchemaRegistry,
        target_table: &str,
    ) -> PipelineResult<Self> {
        let columns = registry.batch_columns(target_table)?;
        let rule = Self::new(name, target_table, columns);
        Ok(match registry.resolve(target_table)? {
            TableSpec::Edge(_) => rule.key(FROM_COLUMN).key(TO_COLUMN),
            TableSpec::Node(spec) => rule.key(&spec.primary_key),
        })
    }

    /// Fill target column `target` from source column `source`
    pub fn map(mut self, source: impl Into<String>, target: &str) -> Self {
        if let Some(idx) = self.target_index(target) {
            self.mappings[idx] = Some(source.into());
        }
        self
    }

    /// Mark a target column as a foreign key
    pub fn key(mut self, target: &str) -> Self {
        if let Some(idx) = self.target_index(target) {
            if !self.keys.contains(&idx) {
                self.keys.push(idx);
            }
        }
        self
    }

    /// Drop repeated projected rows, keeping the first occurrence
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn columns(&self) -> &[TypedColumn] {
        &self.columns
    }

    /// Source columns this rule reads, in target-column order
    pub fn source_columns(&self) -> Vec<&str> {
        self.mappings.iter().flatten().map(String::as_str).collect()
    }

    fn target_index(&self, target: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == target)
    }

    /// Resolve each target column to a source column index or a fill value
    fn plan(&self, batch: &RecordBatch) -> PipelineResult<Vec<Result<usize, Value>>> {
        self.columns
            .iter()
            .zip(&self.mappings)
            .map(|(col, mapping)| match mapping {
                Some(source) => batch.column_index(source).map(Ok).ok_or_else(|| {
                    PipelineError::SchemaMismatch {
                        table: batch.table().to_string(),
                        reason: format!("projection {} reads missing column {}", self.name, source),
                    }
                }),
                None => match &col.default {
                    Some(v) => Ok(Err(v.clone())),
                    None => Err(PipelineError::SchemaMismatch {
                        table: self.target_table.clone(),
                        reason: format!("projection {} does not populate column {}", self.name, col.name),
                    }),
                },
            })
            .collect()
    }
}

/// Apply `rule` to `batch`, producing a new batch for the rule's target table.
/// The source batch is only read.
pub fn project(rule: &ProjectionRule, batch: &RecordBatch) -> PipelineResult<RecordBatch> {
    let plan = rule.plan(batch)?;
    let mut out = RecordBatch::new(rule.target_table.clone(), Arc::clone(&rule.columns));
    let mut seen: FxHashSet<Vec<Value>> = FxHashSet::default();
    let mut dropped = 0usize;

    for (row_idx, row) in batch.rows().iter().enumerate() {
        let mut projected = Vec::with_capacity(plan.len());
        for (col, source) in rule.columns.iter().zip(&plan) {
            let value = match source {
                Ok(idx) => {
                    let raw = row[*idx].clone();
                    coerce_value(raw.clone(), &col.scalar_type).ok_or_else(|| PipelineError::TypeCoercion {
                        table: batch.table().to_string(),
                        column: col.name.clone(),
                        row: row_idx,
                        value: raw.to_text(),
                        expected: col.scalar_type.to_string(),
                    })?
                }
                Err(fill) => fill.clone(),
            };
            projected.push(value);
        }

        if rule.keys.iter().any(|&k| projected[k].is_null()) {
            dropped += 1;
            continue;
        }
        if rule.distinct && !seen.insert(projected.clone()) {
            continue;
        }
        out.push_row(projected)?;
    }

    debug!(
        "Projection {}: {} -> {} rows of {} ({} null keys dropped)",
        rule.name,
        batch.len(),
        out.len(),
        rule.target_table,
        dropped
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EdgeTableSpec, NodeTableSpec};
    use crate::value::ScalarType;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry
            .declare_node_table(
                NodeTableSpec::new("Merchant")
                    .column("merchant_id", ScalarType::String)
                    .column("company_id", ScalarType::String)
                    .column("city", ScalarType::String),
            )
            .unwrap();
        registry
            .declare_node_table(NodeTableSpec::new("Company").column("company_id", ScalarType::String))
            .unwrap();
        registry
            .declare_node_table(NodeTableSpec::new("City").column("city", ScalarType::String))
            .unwrap();
        registry
            .declare_edge_table(EdgeTableSpec::new("BelongsTo", "Merchant", "Company"))
            .unwrap();
        registry
    }

    fn merchants(registry: &SchemaRegistry) -> RecordBatch {
        RecordBatch::from_rows(
            "Merchant",
            registry.batch_columns("Merchant").unwrap(),
            vec![
                vec![Value::from("M1"), Value::from("C1"), Value::from("Boston")],
                vec![Value::from("M2"), Value::Null, Value::from("NYC")],
                vec![Value::from("M3"), Value::from("C1"), Value::from("Boston")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_null_foreign_key_is_dropped() {
        let registry = registry();
        let batch = merchants(&registry);
        let rule = ProjectionRule::for_table("belongs_to", &registry, "BelongsTo")
            .unwrap()
            .map("merchant_id", "from")
            .map("company_id", "to");

        let edges = project(&rule, &batch).unwrap();
        assert_eq!(
            edges.rows(),
            &[
                vec![Value::from("M1"), Value::from("C1")],
                vec![Value::from("M3"), Value::from("C1")],
            ]
        );
        // source untouched
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_distinct_node_projection_keeps_first_order() {
        let registry = registry();
        let rule = ProjectionRule::for_table("cities", &registry, "City")
            .unwrap()
            .map("city", "city")
            .distinct();
        let cities = project(&rule, &merchants(&registry)).unwrap();
        assert_eq!(
            cities.rows(),
            &[vec![Value::from("Boston")], vec![Value::from("NYC")]]
        );
    }

    #[test]
    fn test_unmapped_column_and_missing_source() {
        let registry = registry();
        let unmapped = ProjectionRule::for_table("partial", &registry, "BelongsTo")
            .unwrap()
            .map("merchant_id", "from");
        assert!(matches!(
            project(&unmapped, &merchants(&registry)),
            Err(PipelineError::SchemaMismatch { .. })
        ));

        let missing = ProjectionRule::for_table("bad", &registry, "BelongsTo")
            .unwrap()
            .map("merchant_id", "from")
            .map("owner_id", "to");
        let err = project(&missing, &merchants(&registry)).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { ref reason, .. } if reason.contains("owner_id")));
    }

    #[test]
    fn test_type_mismatch_reports_source_row() {
        let columns = vec![
            TypedColumn::new("from", ScalarType::String),
            TypedColumn::new("to", ScalarType::Int64),
        ];
        let rule = ProjectionRule::new("typed", "Edge", columns)
            .map("merchant_id", "from")
            .map("company_id", "to")
            .key("from")
            .key("to");
        let err = project(&rule, &merchants(&registry())).unwrap_err();
        assert!(matches!(err, PipelineError::TypeCoercion { row: 0, ref column, .. } if column == "to"));
    }
}
