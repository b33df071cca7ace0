//! Relational mirror collaborator
//!
//! A relational database holding the source tables. The pipeline can scan
//! it as a tabular source and mirror enrichment scores back into it.

use crate::error::{PipelineError, PipelineResult};
use crate::schema::TypedColumn;
use crate::source::{RowSet, TabularSource};
use crate::value::{Key, Value};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[async_trait]
pub trait RelationalMirror: Send + Sync {
    /// Short name used in logs and collaborator errors
    fn name(&self) -> &str;

    /// `ALTER TABLE .. ADD COLUMN IF NOT EXISTS`; returns whether the column
    /// was added. Existing rows take the column default.
    async fn add_column_if_absent(&self, table: &str, column: &TypedColumn) -> PipelineResult<bool>;

    /// `UPDATE table SET column = value WHERE key_column = key` for every
    /// pair; returns the number of rows updated.
    async fn update_keyed(
        &self,
        table: &str,
        key_column: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<usize>;

    /// Every row of `table`
    async fn scan(&self, table: &str) -> PipelineResult<RowSet>;
}

/// Scan `table` once and serve the rows as a tabular source
pub async fn scan_source(mirror: &dyn RelationalMirror, table: &str) -> PipelineResult<TabularSource> {
    let rows = mirror.scan(table).await?;
    debug!("Scanned {} rows from {}.{}", rows.rows.len(), mirror.name(), table);
    Ok(TabularSource::Relational(Arc::new(rows)))
}

/// In-memory relational mirror for tests and demos
#[derive(Clone)]
pub struct MemoryMirror {
    name: String,
    tables: Arc<RwLock<IndexMap<String, RowSet>>>,
}

impl MemoryMirror {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Create or replace a table
    pub async fn insert_table(&self, name: impl Into<String>, rows: RowSet) {
        self.tables.write().await.insert(name.into(), rows);
    }

    fn missing(&self, what: String) -> PipelineError {
        PipelineError::collaborator(&self.name, what)
    }
}

fn column_position(rows: &RowSet, column: &str) -> Option<usize> {
    rows.columns.iter().position(|c| c == column)
}

#[async_trait]
impl RelationalMirror for MemoryMirror {
    fn name(&self) -> &str {
        &self.name
    }

    async fn add_column_if_absent(&self, table: &str, column: &TypedColumn) -> PipelineResult<bool> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| self.missing(format!("relation \"{}\" does not exist", table)))?;
        if column_position(rows, &column.name).is_some() {
            return Ok(false);
        }
        rows.columns.push(column.name.clone());
        let fill = column.default.clone().unwrap_or(Value::Null);
        for row in &mut rows.rows {
            row.push(fill.clone());
        }
        Ok(true)
    }

    async fn update_keyed(
        &self,
        table: &str,
        key_column: &str,
        column: &str,
        values: &[(Key, Value)],
    ) -> PipelineResult<usize> {
        let mut tables = self.tables.write().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| self.missing(format!("relation \"{}\" does not exist", table)))?;
        let key_idx = column_position(rows, key_column)
            .ok_or_else(|| self.missing(format!("column \"{}\" of \"{}\" does not exist", key_column, table)))?;
        let target = column_position(rows, column)
            .ok_or_else(|| self.missing(format!("column \"{}\" of \"{}\" does not exist", column, table)))?;

        let updates: IndexMap<&Key, &Value> = values.iter().map(|(k, v)| (k, v)).collect();
        let mut updated = 0;
        for row in &mut rows.rows {
            let Some(key) = row[key_idx].as_key() else {
                continue;
            };
            if let Some(value) = updates.get(&key) {
                row[target] = (*value).clone();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn scan(&self, table: &str) -> PipelineResult<RowSet> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .ok_or_else(|| self.missing(format!("relation \"{}\" does not exist", table)))
    }
}
