use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::model::{ColumnKind, Table, Value};
use crate::error::{EtlError, Result};

/// Convert a table into a single Arrow record batch. Columns of mixed kinds
/// are rendered as strings.
pub fn to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(table.n_cols());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_cols());

    for (name, values) in table.columns() {
        let (data_type, array): (DataType, ArrayRef) = match ColumnKind::of(values) {
            ColumnKind::Integer => (
                DataType::Int64,
                Arc::new(Int64Array::from_iter(values.iter().map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                }))),
            ),
            ColumnKind::Float => (
                DataType::Float64,
                Arc::new(Float64Array::from_iter(
                    values.iter().map(|v| v.as_f64().filter(|f| !f.is_nan())),
                )),
            ),
            ColumnKind::Bool => (
                DataType::Boolean,
                Arc::new(BooleanArray::from_iter(values.iter().map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                }))),
            ),
            ColumnKind::Text | ColumnKind::Mixed | ColumnKind::Empty => (
                DataType::Utf8,
                Arc::new(StringArray::from_iter(values.iter().map(|v| {
                    (!v.is_missing()).then(|| v.to_string())
                }))),
            ),
        };
        fields.push(Field::new(name, data_type, true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.n_rows()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)
        .map_err(|e| EtlError::parse(format!("building record batch: {e}")))
}

/// Render the first `rows` rows as a boxed text table, followed by the shape.
pub fn pretty_head(table: &Table, rows: usize) -> Result<String> {
    let n = rows.min(table.n_rows());
    let head = table.take_rows(&(0..n).collect::<Vec<_>>());
    let batch = to_record_batch(&head)?;
    let rendered = arrow::util::pretty::pretty_format_batches(&[batch])
        .map_err(|e| EtlError::parse(format!("formatting table: {e}")))?;
    let (total_rows, cols) = table.shape();
    Ok(format!("{rendered}\n[{total_rows} rows x {cols} columns]"))
}
