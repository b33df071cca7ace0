//! Tabular sources: delimited text, Parquet files and relational scans
//!
//! `read_batches` re-opens the source on every call and yields typed
//! [`RecordBatch`]es lazily, so a failed load can simply read again.

pub mod coerce;
pub mod columnar;
pub mod delimited;

use crate::batch::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{SchemaRegistry, TableSpec, TypedColumn, FROM_COLUMN, TO_COLUMN};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reader options shared by every source kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Field separator for delimited text
    pub delimiter: char,
    /// Whether delimited text starts with a header row. Headerless files are
    /// read positionally in declared column order.
    pub has_header: bool,
    /// Rows per yielded batch
    pub batch_size: usize,
    /// Fail on source columns the table does not declare
    pub strict_columns: bool,
    /// Delimited-text field that stands for `Null`. When empty, empty fields
    /// are `Null` and empty strings cannot be represented.
    pub null_marker: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
            batch_size: 1024,
            strict_columns: false,
            null_marker: String::new(),
        }
    }
}

impl SourceOptions {
    pub(crate) fn delimiter_byte(&self) -> PipelineResult<u8> {
        u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| PipelineError::Config(format!("delimiter {:?} is not ASCII", self.delimiter)))
    }

    pub(crate) fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }
}

/// Rows returned by a relational query, with their column names
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

/// Where a table's rows come from
#[derive(Debug, Clone)]
pub enum TabularSource {
    /// Delimited text file
    Csv(PathBuf),
    /// Columnar Parquet file
    Parquet(PathBuf),
    /// Result of a relational query
    Relational(Arc<RowSet>),
}

impl TabularSource {
    /// Pick the file kind from the extension; anything but `.parquet` is
    /// treated as delimited text.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("parquet") => TabularSource::Parquet(path.to_path_buf()),
            _ => TabularSource::Csv(path.to_path_buf()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            TabularSource::Csv(p) => format!("csv:{}", p.display()),
            TabularSource::Parquet(p) => format!("parquet:{}", p.display()),
            TabularSource::Relational(rows) => format!("relational:{} rows", rows.rows.len()),
        }
    }
}

/// Target column layout of the batches read from a source
#[derive(Debug, Clone)]
pub struct BatchLayout {
    pub table: String,
    pub columns: Arc<[TypedColumn]>,
    /// Indexes of columns that may never be null
    pub required: Vec<usize>,
}

impl BatchLayout {
    pub fn new(table: impl Into<String>, columns: impl Into<Arc<[TypedColumn]>>) -> Self {
        Self {
            table: table.into(),
            columns: columns.into(),
            required: Vec::new(),
        }
    }

    pub fn require(mut self, column: &str) -> Self {
        if let Some(idx) = self.columns.iter().position(|c| c.name == column) {
            if !self.required.contains(&idx) {
                self.required.push(idx);
            }
        }
        self
    }

    /// Layout for loading `table`: a node table's columns with a non-null
    /// primary key, or an edge table's `from`/`to`/properties.
    pub fn for_table(registry: &SchemaRegistry, table: &str) -> PipelineResult<Self> {
        let columns = registry.batch_columns(table)?;
        let layout = Self::new(table, columns);
        Ok(match registry.resolve(table)? {
            TableSpec::Node(spec) => layout.require(&spec.primary_key),
            TableSpec::Edge(_) => layout.require(FROM_COLUMN).require(TO_COLUMN),
        })
    }

    pub(crate) fn empty_batch(&self) -> RecordBatch {
        RecordBatch::new(self.table.clone(), Arc::clone(&self.columns))
    }
}

#[derive(Debug, Clone)]
enum FieldSource {
    Field(usize),
    Fill(Value),
}

/// Maps source fields onto declared columns
#[derive(Debug, Clone)]
pub(crate) struct ColumnPlan {
    layout: BatchLayout,
    sources: Vec<FieldSource>,
}

impl ColumnPlan {
    /// Match source fields to declared columns by name
    pub(crate) fn by_name(layout: &BatchLayout, fields: &[String], strict: bool) -> PipelineResult<Self> {
        if strict {
            if let Some(extra) = fields
                .iter()
                .find(|f| !layout.columns.iter().any(|c| &c.name == *f))
            {
                return Err(PipelineError::SchemaMismatch {
                    table: layout.table.clone(),
                    reason: format!("source column {} is not declared", extra),
                });
            }
        }
        let sources = layout
            .columns
            .iter()
            .map(|col| match fields.iter().position(|f| *f == col.name) {
                Some(idx) => Ok(FieldSource::Field(idx)),
                None => missing(layout, col),
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self {
            layout: layout.clone(),
            sources,
        })
    }

    /// Match source fields to declared columns by position
    pub(crate) fn by_position(layout: &BatchLayout, field_count: usize, strict: bool) -> PipelineResult<Self> {
        if strict && field_count > layout.columns.len() {
            return Err(PipelineError::SchemaMismatch {
                table: layout.table.clone(),
                reason: format!(
                    "source has {} fields, table declares {} columns",
                    field_count,
                    layout.columns.len()
                ),
            });
        }
        let sources = layout
            .columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                if idx < field_count {
                    Ok(FieldSource::Field(idx))
                } else {
                    missing(layout, col)
                }
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(Self {
            layout: layout.clone(),
            sources,
        })
    }

    pub(crate) fn layout(&self) -> &BatchLayout {
        &self.layout
    }

    /// Build one typed row. `field` converts a source field to the column's
    /// type, returning the raw text on failure.
    pub(crate) fn build_row<F>(&self, row: usize, mut field: F) -> PipelineResult<Vec<Value>>
    where
        F: FnMut(usize, &TypedColumn) -> Result<Value, String>,
    {
        let mut values = Vec::with_capacity(self.sources.len());
        for (col, source) in self.layout.columns.iter().zip(&self.sources) {
            let value = match source {
                FieldSource::Field(idx) => field(*idx, col).map_err(|raw| PipelineError::TypeCoercion {
                    table: self.layout.table.clone(),
                    column: col.name.clone(),
                    row,
                    value: raw,
                    expected: col.scalar_type.to_string(),
                })?,
                FieldSource::Fill(v) => v.clone(),
            };
            values.push(value);
        }
        for &idx in &self.layout.required {
            if values[idx].is_null() {
                let col = &self.layout.columns[idx];
                return Err(PipelineError::TypeCoercion {
                    table: self.layout.table.clone(),
                    column: col.name.clone(),
                    row,
                    value: String::new(),
                    expected: format!("non-null {}", col.scalar_type),
                });
            }
        }
        Ok(values)
    }
}

fn missing(layout: &BatchLayout, col: &TypedColumn) -> PipelineResult<FieldSource> {
    match &col.default {
        Some(default) => Ok(FieldSource::Fill(default.clone())),
        None => Err(PipelineError::SchemaMismatch {
            table: layout.table.clone(),
            reason: format!("declared column {} is missing from the source", col.name),
        }),
    }
}

/// Lazy sequence of batches; stops after the first error
pub struct BatchReader {
    inner: Box<dyn Iterator<Item = PipelineResult<RecordBatch>> + Send>,
    layout: BatchLayout,
    done: bool,
}

impl BatchReader {
    pub(crate) fn new<I>(layout: BatchLayout, inner: I) -> Self
    where
        I: Iterator<Item = PipelineResult<RecordBatch>> + Send + 'static,
    {
        Self {
            inner: Box::new(inner),
            layout,
            done: false,
        }
    }

    /// Drain every batch into one
    pub fn read_all(self) -> PipelineResult<RecordBatch> {
        let mut all = self.layout.empty_batch();
        for batch in self {
            for row in batch?.into_rows() {
                all.push_row(row)?;
            }
        }
        Ok(all)
    }
}

impl Iterator for BatchReader {
    type Item = PipelineResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.inner.next();
        match &item {
            None | Some(Err(_)) => self.done = true,
            Some(Ok(_)) => {}
        }
        item
    }
}

/// Open `source` from the beginning and read it as `layout`
pub fn read_batches(
    source: &TabularSource,
    layout: &BatchLayout,
    options: &SourceOptions,
) -> PipelineResult<BatchReader> {
    match source {
        TabularSource::Csv(path) => delimited::open(path, layout, options),
        TabularSource::Parquet(path) => columnar::open(path, layout, options),
        TabularSource::Relational(rows) => {
            let plan = ColumnPlan::by_name(layout, &rows.columns, options.strict_columns)?;
            Ok(BatchReader::new(
                layout.clone(),
                RowSetBatches {
                    rows: Arc::clone(rows),
                    plan,
                    offset: 0,
                    batch_size: options.effective_batch_size(),
                },
            ))
        }
    }
}

struct RowSetBatches {
    rows: Arc<RowSet>,
    plan: ColumnPlan,
    offset: usize,
    batch_size: usize,
}

impl Iterator for RowSetBatches {
    type Item = PipelineResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.rows.rows.len() {
            return None;
        }
        let end = (self.offset + self.batch_size).min(self.rows.rows.len());
        let mut batch = self.plan.layout().empty_batch();
        for row_idx in self.offset..end {
            let source_row = &self.rows.rows[row_idx];
            let built = self.plan.build_row(row_idx, |idx, col| {
                let value = source_row.get(idx).cloned().unwrap_or(Value::Null);
                let raw = value.to_text();
                coerce::coerce_value(value, &col.scalar_type).ok_or(raw)
            });
            if let Err(e) = built.and_then(|row| batch.push_row(row)) {
                return Some(Err(e));
            }
        }
        self.offset = end;
        Some(Ok(batch))
    }
}
