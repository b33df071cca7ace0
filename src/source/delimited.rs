//! Delimited text (CSV) reader and writer

use super::coerce::parse_field;
use super::{BatchLayout, BatchReader, ColumnPlan, SourceOptions};
use crate::batch::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::value::Value;
use std::fs::File;
use std::path::Path;
use tracing::debug;

pub(crate) fn open(path: &Path, layout: &BatchLayout, options: &SourceOptions) -> PipelineResult<BatchReader> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .has_headers(options.has_header)
        .from_path(path)?;

    let plan = if options.has_header {
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        Some(ColumnPlan::by_name(layout, &headers, options.strict_columns)?)
    } else {
        // positional plan is fixed once the first record shows the width
        None
    };
    debug!("Reading {} as {}", path.display(), layout.table);

    Ok(BatchReader::new(
        layout.clone(),
        CsvBatches {
            reader,
            plan,
            layout: layout.clone(),
            strict: options.strict_columns,
            null_marker: options.null_marker.clone(),
            batch_size: options.effective_batch_size(),
            row: 0,
            record: csv::StringRecord::new(),
        },
    ))
}

struct CsvBatches {
    reader: csv::Reader<File>,
    plan: Option<ColumnPlan>,
    layout: BatchLayout,
    strict: bool,
    null_marker: String,
    batch_size: usize,
    row: usize,
    record: csv::StringRecord,
}

impl CsvBatches {
    fn next_batch(&mut self) -> PipelineResult<Option<RecordBatch>> {
        let mut batch = self.layout.empty_batch();
        while batch.len() < self.batch_size {
            if !self.reader.read_record(&mut self.record)? {
                break;
            }
            if self.plan.is_none() {
                self.plan = Some(ColumnPlan::by_position(&self.layout, self.record.len(), self.strict)?);
            }
            let Some(plan) = self.plan.as_ref() else {
                break;
            };
            let (record, null_marker) = (&self.record, self.null_marker.as_str());
            let row = plan.build_row(self.row, |idx, col| {
                let raw = record.get(idx).unwrap_or_default();
                parse_field(raw, &col.scalar_type, null_marker).ok_or_else(|| raw.to_string())
            })?;
            batch.push_row(row)?;
            self.row += 1;
        }
        Ok((!batch.is_empty()).then_some(batch))
    }
}

impl Iterator for CsvBatches {
    type Item = PipelineResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

/// Write a batch as delimited text; the header row carries the column names.
/// `Null` is written as the null marker. A string that would read back as
/// `Null` is a `SchemaMismatch`. Returns the number of data rows written.
pub fn write_csv(path: &Path, batch: &RecordBatch, options: &SourceOptions) -> PipelineResult<usize> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter_byte()?)
        .from_path(path)?;
    if options.has_header {
        writer.write_record(batch.column_names())?;
    }
    let marker = options.null_marker.as_str();
    let names = batch.column_names();
    for (idx, row) in batch.rows().iter().enumerate() {
        let mut fields = Vec::with_capacity(row.len());
        for (value, column) in row.iter().zip(&names) {
            match value {
                Value::Null => fields.push(marker.to_string()),
                Value::String(s) if s == marker => {
                    return Err(PipelineError::SchemaMismatch {
                        table: batch.table().to_string(),
                        reason: format!(
                            "row {} column {}: {:?} collides with the null marker {:?}",
                            idx, column, s, marker
                        ),
                    })
                }
                other => fields.push(other.to_text()),
            }
        }
        writer.write_record(&fields)?;
    }
    writer.flush()?;
    debug!("Wrote {} rows of {} to {}", batch.len(), batch.table(), path.display());
    Ok(batch.len())
}
