//! Parquet reader and writer
//!
//! Columns are read through Arrow and converted to [`Value`]s; integer,
//! float and string widths are normalized with `arrow::compute::cast` first.
//! Timestamps are written with nanosecond units so they round-trip exactly.

use super::coerce::coerce_value;
use super::{BatchLayout, BatchReader, ColumnPlan, SourceOptions};
use crate::batch::RecordBatch;
use crate::error::{PipelineError, PipelineResult};
use crate::schema::TypedColumn;
use crate::value::{ScalarType, Value};
use arrow::array::{
    Array, ArrayRef, BooleanArray, FixedSizeListArray, Float64Array, Int64Array, LargeListArray,
    ListArray, StringArray, TimestampNanosecondArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema, TimeUnit};
use arrow::record_batch::RecordBatch as ArrowBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub(crate) fn open(path: &Path, layout: &BatchLayout, options: &SourceOptions) -> PipelineResult<BatchReader> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let fields: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let plan = ColumnPlan::by_name(layout, &fields, options.strict_columns)?;
    let reader = builder.with_batch_size(options.effective_batch_size()).build()?;
    debug!("Reading {} as {}", path.display(), layout.table);

    Ok(BatchReader::new(
        layout.clone(),
        ParquetBatches {
            reader,
            plan,
            row: 0,
        },
    ))
}

struct ParquetBatches {
    reader: ParquetRecordBatchReader,
    plan: ColumnPlan,
    row: usize,
}

impl ParquetBatches {
    fn convert(&mut self, arrow_batch: ArrowBatch) -> PipelineResult<RecordBatch> {
        let columns: Vec<ArrayRef> = arrow_batch
            .columns()
            .iter()
            .map(normalize)
            .collect::<PipelineResult<_>>()?;
        let mut batch = self.plan.layout().empty_batch();
        for i in 0..arrow_batch.num_rows() {
            let row = self.plan.build_row(self.row, |idx, col| {
                let value = arrow_value(&columns[idx], i)?;
                let raw = value.to_text();
                coerce_value(value, &col.scalar_type).ok_or(raw)
            })?;
            batch.push_row(row)?;
            self.row += 1;
        }
        Ok(batch)
    }
}

impl Iterator for ParquetBatches {
    type Item = PipelineResult<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let arrow_batch = self.reader.next()?;
        Some(
            arrow_batch
                .map_err(PipelineError::from)
                .and_then(|b| self.convert(b)),
        )
    }
}

/// Cast narrow or large physical types to the handful `arrow_value` reads
fn normalize(array: &ArrayRef) -> PipelineResult<ArrayRef> {
    let target = match array.data_type() {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => DataType::Int64,
        DataType::Float16 | DataType::Float32 => DataType::Float64,
        DataType::LargeUtf8 => DataType::Utf8,
        DataType::Date32 | DataType::Date64 => DataType::Timestamp(TimeUnit::Nanosecond, None),
        DataType::Timestamp(unit, tz) if *unit != TimeUnit::Nanosecond || tz.is_some() => {
            DataType::Timestamp(TimeUnit::Nanosecond, None)
        }
        _ => return Ok(Arc::clone(array)),
    };
    Ok(cast(array, &target)?)
}

fn arrow_value(array: &ArrayRef, row: usize) -> Result<Value, String> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<Int64Array>() {
        return Ok(Value::Int64(a.value(row)));
    }
    // pandas and DuckDB exports commonly use unsigned ids
    if let Some(a) = any.downcast_ref::<UInt64Array>() {
        let raw = a.value(row);
        return i64::try_from(raw).map(Value::Int64).map_err(|_| raw.to_string());
    }
    if let Some(a) = any.downcast_ref::<Float64Array>() {
        return Ok(Value::Float64(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<StringArray>() {
        return Ok(Value::String(a.value(row).to_string()));
    }
    if let Some(a) = any.downcast_ref::<BooleanArray>() {
        return Ok(Value::Boolean(a.value(row)));
    }
    if let Some(a) = any.downcast_ref::<TimestampNanosecondArray>() {
        return a
            .value_as_datetime(row)
            .map(Value::Timestamp)
            .ok_or_else(|| a.value(row).to_string());
    }
    let items = if let Some(a) = any.downcast_ref::<FixedSizeListArray>() {
        Some(a.value(row))
    } else if let Some(a) = any.downcast_ref::<ListArray>() {
        Some(a.value(row))
    } else if let Some(a) = any.downcast_ref::<LargeListArray>() {
        Some(a.value(row))
    } else {
        None
    };
    match items {
        Some(items) => float_items(&items).map(Value::Vector),
        None => Err(format!("<{}>", array.data_type())),
    }
}

fn float_items(items: &ArrayRef) -> Result<Vec<f64>, String> {
    let floats = cast(items, &DataType::Float64).map_err(|e| e.to_string())?;
    let floats = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| format!("<{}>", items.data_type()))?;
    if floats.null_count() > 0 {
        return Err("vector with null items".to_string());
    }
    Ok(floats.values().to_vec())
}

fn arrow_type(ty: &ScalarType) -> DataType {
    match ty {
        ScalarType::Int64 => DataType::Int64,
        ScalarType::Float64 => DataType::Float64,
        ScalarType::String => DataType::Utf8,
        ScalarType::Boolean => DataType::Boolean,
        ScalarType::Timestamp => DataType::Timestamp(TimeUnit::Nanosecond, None),
        ScalarType::Vector(dim) => DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float64, true)),
            *dim as i32,
        ),
    }
}

/// Arrow schema matching a column layout
pub fn arrow_schema(columns: &[TypedColumn]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|c| Field::new(c.name.as_str(), arrow_type(&c.scalar_type), true))
            .collect::<Vec<_>>(),
    )
}

fn column_array(batch: &RecordBatch, idx: usize, column: &TypedColumn) -> PipelineResult<ArrayRef> {
    let values = batch.rows().iter().map(|r| &r[idx]);
    let array: ArrayRef = match column.scalar_type {
        ScalarType::Int64 => Arc::new(Int64Array::from(values.map(Value::as_int).collect::<Vec<_>>())),
        ScalarType::Float64 => Arc::new(Float64Array::from(values.map(Value::as_float).collect::<Vec<_>>())),
        ScalarType::String => Arc::new(StringArray::from(values.map(Value::as_str).collect::<Vec<_>>())),
        ScalarType::Boolean => Arc::new(BooleanArray::from(values.map(Value::as_bool).collect::<Vec<_>>())),
        ScalarType::Timestamp => {
            let nanos = values
                .map(|v| match v {
                    Value::Timestamp(t) => t.and_utc().timestamp_nanos_opt().map(Some).ok_or_else(|| {
                        PipelineError::SchemaMismatch {
                            table: batch.table().to_string(),
                            reason: format!("timestamp {} in {} is out of range", t, column.name),
                        }
                    }),
                    _ => Ok(None),
                })
                .collect::<PipelineResult<Vec<Option<i64>>>>()?;
            Arc::new(TimestampNanosecondArray::from(nanos))
        }
        ScalarType::Vector(dim) => {
            let items = values.map(|v| match v {
                Value::Vector(items) => Some(items.iter().copied().map(Some).collect::<Vec<_>>()),
                _ => None,
            });
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float64Type, _, _>(
                items,
                dim as i32,
            ))
        }
    };
    Ok(array)
}

/// Write a batch to a Parquet file. Returns the number of rows written.
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> PipelineResult<usize> {
    let schema = Arc::new(arrow_schema(batch.columns()));
    let arrays = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| column_array(batch, idx, col))
        .collect::<PipelineResult<Vec<_>>>()?;
    let arrow_batch = ArrowBatch::try_new(Arc::clone(&schema), arrays)?;

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&arrow_batch)?;
    writer.close()?;
    debug!("Wrote {} rows of {} to {}", batch.len(), batch.table(), path.display());
    Ok(batch.len())
}
