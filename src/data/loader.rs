use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Table, Value};
use crate::error::{EtlError, Result};

/// Spellings read as a missing cell, on top of the empty field.
const NA_VALUES: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a table from a local file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row followed by records
/// * `.json`    – `[{ "Country": "...", "F2000": 0.3, ... }, ...]`
/// * `.parquet` – flat columns of strings, ints, floats or bools
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => read_csv(std::fs::File::open(path)?),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(EtlError::parse(format!(
            "Unsupported file extension: .{other}"
        ))),
    }
}

/// Parse comma-separated text with a header row into a [`Table`].
///
/// Columns are typed by looking at every non-missing cell: all integers gives
/// an integer column, all numbers a float column, all `true`/`false` a bool
/// column, and anything else a string column.
pub fn read_csv<R: Read>(mut source: R) -> Result<Table> {
    let mut text = String::new();
    source
        .read_to_string(&mut text)
        .map_err(|e| EtlError::parse(format!("reading CSV: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    if text.trim().is_empty() {
        return Err(EtlError::parse("No columns to parse from empty input"));
    }
    if ends_inside_quotes(text) {
        return Err(EtlError::parse("Unterminated quoted field"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EtlError::parse(format!("reading CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| EtlError::parse(format!("CSV row {row_no}: {e}")))?;
        for (col, field) in raw.iter_mut().zip(record.iter()) {
            col.push(field.to_string());
        }
    }

    let data = raw.into_iter().map(infer_column).collect();
    Table::new(headers, data)
}

/// Whether the input ends while a quoted field is still open. A quote only
/// opens a field at its first byte; anywhere else it is a literal character.
fn ends_inside_quotes(text: &str) -> bool {
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut bytes = text.bytes().peekable();
    while let Some(b) = bytes.next() {
        if in_quotes {
            if b == b'"' && bytes.next_if_eq(&b'"').is_none() {
                in_quotes = false;
            }
            continue;
        }
        match b {
            b'"' if at_field_start => {
                in_quotes = true;
                at_field_start = false;
            }
            b',' | b'\n' | b'\r' => at_field_start = true,
            _ => at_field_start = false,
        }
    }
    in_quotes
}

// ---------------------------------------------------------------------------
// Type inference
// ---------------------------------------------------------------------------

fn is_na(s: &str) -> bool {
    s.is_empty() || NA_VALUES.contains(&s)
}

fn infer_column(cells: Vec<String>) -> Vec<Value> {
    let present = || cells.iter().filter(|c| !is_na(c));

    let convert = |parse: &dyn Fn(&str) -> Value| -> Vec<Value> {
        cells
            .iter()
            .map(|c| if is_na(c) { Value::Null } else { parse(c.trim()) })
            .collect()
    };

    if present().all(|c| c.trim().parse::<i64>().is_ok()) {
        return convert(&|s: &str| s.parse().map(Value::Integer).unwrap_or(Value::Null));
    }
    if present().all(|c| c.trim().parse::<f64>().is_ok()) {
        return convert(&|s: &str| s.parse().map(Value::Float).unwrap_or(Value::Null));
    }
    if present().all(|c| parse_bool(c.trim()).is_some()) {
        return convert(&|s: &str| parse_bool(s).map(Value::Bool).unwrap_or(Value::Null));
    }
    cells
        .into_iter()
        .map(|c| if is_na(&c) { Value::Null } else { Value::String(c) })
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
/// Column order follows the first time each key is seen.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path)?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| EtlError::parse(format!("parsing JSON: {e}")))?;

    let records = root
        .as_array()
        .ok_or_else(|| EtlError::parse("Expected top-level JSON array"))?;

    let mut columns: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| EtlError::parse(format!("Row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(JsonValue::as_object)
        .map(|obj| {
            columns
                .iter()
                .map(|col| obj.get(col).map_or(Value::Null, json_to_value))
                .collect()
        })
        .collect();

    Table::from_rows(columns, rows)
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet file written by Pandas (`df.to_parquet()`) or Polars.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EtlError::parse(format!("reading parquet metadata: {e}")))?;

    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder
        .build()
        .map_err(|e| EtlError::parse(format!("building parquet reader: {e}")))?;

    let mut data: Vec<Vec<Value>> = vec![Vec::new(); columns.len()];
    for batch_result in reader {
        let batch =
            batch_result.map_err(|e| EtlError::parse(format!("reading parquet batch: {e}")))?;
        for (col_idx, values) in data.iter_mut().enumerate() {
            let array = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                values.push(extract_value(array, row)?);
            }
        }
    }

    Table::new(columns, data)
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Result<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let mismatch = || EtlError::parse(format!("unexpected array for {:?}", col.data_type()));
    let value = match col.data_type() {
        DataType::Utf8 => {
            let arr = col.as_any().downcast_ref::<StringArray>().ok_or_else(mismatch)?;
            Value::String(arr.value(row).to_string())
        }
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().ok_or_else(mismatch)?;
            Value::Integer(arr.value(row) as i64)
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().ok_or_else(mismatch)?;
            Value::Integer(arr.value(row))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().ok_or_else(mismatch)?;
            Value::Float(arr.value(row) as f64)
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().ok_or_else(mismatch)?;
            Value::Float(arr.value(row))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>().ok_or_else(mismatch)?;
            Value::Bool(arr.value(row))
        }
        other => {
            return Err(EtlError::parse(format!(
                "Unsupported parquet column type {other:?}"
            )))
        }
    };
    Ok(value)
}
