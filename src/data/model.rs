use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

use crate::error::{EtlError, Result};

// ---------------------------------------------------------------------------
// Value – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell value mirroring the dtypes a CSV column infers to.
/// Values are join keys in a `BTreeSet` and partition keys in a `HashMap`, so
/// `Value` needs `Ord` as well as `Eq + Hash`.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

impl Value {
    /// `Null` and `NaN` both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Try to interpret the value as an `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

// -- Manual Eq/Ord/Hash: join keys (BTreeSet) and partition keys (HashMap); floats by total order --

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnKind – the storage type a column settles on
// ---------------------------------------------------------------------------

/// Storage type shared by the non-missing values of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
    /// Every cell is missing.
    Empty,
    /// Values of incompatible kinds.
    Mixed,
}

impl ColumnKind {
    pub fn of(values: &[Value]) -> Self {
        let mut kind = ColumnKind::Empty;
        for value in values {
            let this = match value {
                Value::Null => continue,
                Value::Float(v) if v.is_nan() => continue,
                Value::Integer(_) => ColumnKind::Integer,
                Value::Float(_) => ColumnKind::Float,
                Value::Bool(_) => ColumnKind::Bool,
                Value::String(_) => ColumnKind::Text,
            };
            kind = match (kind, this) {
                (ColumnKind::Empty, k) => k,
                (a, b) if a == b => a,
                (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                    ColumnKind::Float
                }
                _ => return ColumnKind::Mixed,
            };
        }
        kind
    }
}

// ---------------------------------------------------------------------------
// Table – named columns of equal length
// ---------------------------------------------------------------------------

/// An ordered set of uniquely named columns, stored column-major.
///
/// The row count is kept separately so a table whose columns were all
/// dropped still remembers how many rows it has.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    n_rows: usize,
}

impl Table {
    /// Build a table from column names and column-major data.
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Result<Self> {
        let n_rows = data.first().map_or(0, Vec::len);
        Self::with_row_count(columns, data, n_rows)
    }

    /// Build a table from column names and row-major records.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let n_rows = rows.len();
        let mut data: Vec<Vec<Value>> = columns
            .iter()
            .map(|_| Vec::with_capacity(n_rows))
            .collect();
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(EtlError::parse(format!(
                    "Row {i} has {} values but there are {} columns",
                    row.len(),
                    columns.len()
                )));
            }
            for (col, value) in data.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Self::with_row_count(columns, data, n_rows)
    }

    fn with_row_count(columns: Vec<String>, data: Vec<Vec<Value>>, n_rows: usize) -> Result<Self> {
        if columns.len() != data.len() {
            return Err(EtlError::parse(format!(
                "{} column names for {} columns",
                columns.len(),
                data.len()
            )));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(EtlError::parse(format!("Duplicate column name '{name}'")));
            }
        }
        for (name, col) in columns.iter().zip(&data) {
            if col.len() != n_rows {
                return Err(EtlError::parse(format!(
                    "Column '{name}' has {} values, expected {n_rows}",
                    col.len()
                )));
            }
        }
        Ok(Table {
            columns,
            data,
            n_rows,
        })
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`, the way a dataframe reports its shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.columns.len())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_index(name).map(|i| self.data[i].as_slice())
    }

    /// Iterate `(name, values)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns
            .iter()
            .zip(&self.data)
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Cells of row `index`, in column order.
    pub fn row(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.data.iter().map(move |col| &col[index])
    }

    /// Keep only the columns for which `keep(name)` is true.
    pub fn retain_columns(&self, mut keep: impl FnMut(&str) -> bool) -> Table {
        let (columns, data) = self
            .columns
            .iter()
            .zip(&self.data)
            .filter(|(name, _)| keep(name))
            .map(|(name, values)| (name.clone(), values.clone()))
            .unzip();
        Table {
            columns,
            data,
            n_rows: self.n_rows,
        }
    }

    /// Keep only the rows for which `keep(index)` is true. Survivors are
    /// renumbered densely from zero.
    pub fn retain_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Table {
        let indices: Vec<usize> = (0..self.n_rows).filter(|&i| keep(i)).collect();
        self.take_rows(&indices)
    }

    /// New table made of the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let data = self
            .data
            .iter()
            .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
            .collect();
        Table {
            columns: self.columns.clone(),
            data,
            n_rows: indices.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let err = Table::new(
            names(&["a", "a"]),
            vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Parse(_)));
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = Table::new(
            names(&["a", "b"]),
            vec![vec![Value::Integer(1)], vec![]],
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Parse(_)));
    }

    #[test]
    fn zero_column_table_keeps_row_count() {
        let table = Table::from_rows(vec![], vec![vec![], vec![], vec![]]).unwrap();
        assert_eq!(table.shape(), (3, 0));
        assert_eq!(table.retain_rows(|i| i != 1).shape(), (2, 0));
    }

    #[test]
    fn retain_and_take_preserve_order() {
        let table = Table::from_rows(
            names(&["a", "b"]),
            vec![
                vec![Value::Integer(0), Value::from("x")],
                vec![Value::Integer(1), Value::from("y")],
                vec![Value::Integer(2), Value::from("z")],
            ],
        )
        .unwrap();

        let only_b = table.retain_columns(|name| name == "b");
        assert_eq!(only_b.column_names(), &names(&["b"])[..]);
        assert_eq!(only_b.n_rows(), 3);

        let taken = table.take_rows(&[2, 0]);
        assert_eq!(
            taken.column("a").unwrap(),
            &[Value::Integer(2), Value::Integer(0)][..]
        );
        assert_eq!(taken.row(1).cloned().collect::<Vec<_>>(), vec![Value::Integer(0), Value::from("x")]);
    }

    #[test]
    fn nan_is_missing_and_equal_to_itself() {
        assert!(Value::Float(f64::NAN).is_missing());
        assert!(Value::Null.is_missing());
        assert!(!Value::Float(0.0).is_missing());
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn equal_values_group_under_one_hash_key() {
        let cells = [
            Value::Float(f64::NAN),
            Value::from("Forest area"),
            Value::Float(f64::NAN),
            Value::Null,
            Value::from("Forest area"),
            Value::Float(0.0),
            Value::Float(-0.0),
        ];
        let mut groups: std::collections::HashMap<&Value, usize> = Default::default();
        for cell in &cells {
            *groups.entry(cell).or_default() += 1;
        }
        assert_eq!(groups.len(), 5);
        assert_eq!(groups[&Value::Float(f64::NAN)], 2);
        assert_eq!(groups[&Value::from("Forest area")], 2);
        assert_eq!(groups[&Value::Null], 1);
    }

    #[test]
    fn column_kind_widens_integers_to_float() {
        let values = [Value::Integer(1), Value::Null, Value::Float(2.5)];
        assert_eq!(ColumnKind::of(&values), ColumnKind::Float);
        assert_eq!(ColumnKind::of(&[Value::Null]), ColumnKind::Empty);
        assert_eq!(
            ColumnKind::of(&[Value::Integer(1), Value::from("a")]),
            ColumnKind::Mixed
        );
    }
}
