//! Record batches: typed rows bound for one table

use crate::error::{PipelineError, PipelineResult};
use crate::schema::TypedColumn;
use crate::value::Value;
use std::sync::Arc;

/// Ordered rows conforming to one column layout.
///
/// Rows are positional against `columns`; every value is checked against
/// its column type when pushed, so a batch is always internally consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    table: String,
    columns: Arc<[TypedColumn]>,
    rows: Vec<Vec<Value>>,
}

impl RecordBatch {
    pub fn new(table: impl Into<String>, columns: impl Into<Arc<[TypedColumn]>>) -> Self {
        Self {
            table: table.into(),
            columns: columns.into(),
            rows: Vec::new(),
        }
    }

    /// Build a batch from literal rows, checking each one
    pub fn from_rows<R, V>(
        table: impl Into<String>,
        columns: impl Into<Arc<[TypedColumn]>>,
        rows: R,
    ) -> PipelineResult<Self>
    where
        R: IntoIterator<Item = Vec<V>>,
        V: Into<Value>,
    {
        let mut batch = Self::new(table, columns);
        for row in rows {
            batch.push_row(row.into_iter().map(Into::into).collect())?;
        }
        Ok(batch)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> PipelineResult<()> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::SchemaMismatch {
                table: self.table.clone(),
                reason: format!(
                    "row {} has {} values, expected {}",
                    self.rows.len(),
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        for (col, value) in self.columns.iter().zip(&row) {
            if !value.conforms_to(&col.scalar_type) {
                return Err(PipelineError::TypeCoercion {
                    table: self.table.clone(),
                    column: col.name.clone(),
                    row: self.rows.len(),
                    value: value.to_text(),
                    expected: col.scalar_type.to_string(),
                });
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[TypedColumn] {
        &self.columns
    }

    pub(crate) fn shared_columns(&self) -> Arc<[TypedColumn]> {
        Arc::clone(&self.columns)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Value>> {
        self.rows
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All values of one column, in row order
    pub fn column_values(&self, column: &str) -> Option<Vec<&Value>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that this batch has exactly the expected column layout
    pub fn check_layout(&self, expected: &[TypedColumn]) -> PipelineResult<()> {
        let same = self.columns.len() == expected.len()
            && self
                .columns
                .iter()
                .zip(expected)
                .all(|(a, b)| a.name == b.name && a.scalar_type == b.scalar_type);
        if same {
            return Ok(());
        }
        let describe = |cols: &[TypedColumn]| {
            cols.iter()
                .map(|c| format!("{} {}", c.name, c.scalar_type))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Err(PipelineError::SchemaMismatch {
            table: self.table.clone(),
            reason: format!(
                "batch columns ({}) do not match table columns ({})",
                describe(&self.columns),
                describe(expected)
            ),
        })
    }
}
