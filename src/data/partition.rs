use std::collections::{BTreeSet, HashMap};

use super::model::{Table, Value};
use crate::error::{EtlError, Result};

/// Sub-tables keyed by indicator value, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitions {
    entries: Vec<(Value, Table)>,
}

impl Partitions {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Table> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Table)> {
        self.entries.iter().map(|(k, t)| (k, t))
    }
}

impl IntoIterator for Partitions {
    type Item = (Value, Table);
    type IntoIter = std::vec::IntoIter<(Value, Table)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

fn key_column<'a>(table: &'a Table, column: &str) -> Result<&'a [Value]> {
    table
        .column(column)
        .ok_or_else(|| EtlError::MissingColumn(column.to_string()))
}

/// Distinct values of `key` present in both tables. Missing keys never match.
pub fn inner_join_keys(a: &Table, b: &Table, key: &str) -> Result<BTreeSet<Value>> {
    let distinct = |t: &Table| -> Result<BTreeSet<Value>> {
        Ok(key_column(t, key)?
            .iter()
            .filter(|v| !v.is_missing())
            .cloned()
            .collect())
    };
    let left = distinct(a)?;
    let right = distinct(b)?;
    Ok(left.intersection(&right).cloned().collect())
}

/// Rows whose `key` value is in `keys`, original order kept.
pub fn restrict_to_keys(table: &Table, key: &str, keys: &BTreeSet<Value>) -> Result<Table> {
    let column = key_column(table, key)?;
    Ok(table.retain_rows(|i| keys.contains(&column[i])))
}

/// Split `table` into one sub-table per distinct value of `indicator`.
pub fn partition_by_indicator(table: &Table, indicator: &str) -> Result<Partitions> {
    let column = key_column(table, indicator)?;

    let mut order: Vec<&Value> = Vec::new();
    let mut groups: HashMap<&Value, Vec<usize>> = HashMap::new();
    for (i, value) in column.iter().enumerate() {
        groups
            .entry(value)
            .or_insert_with(|| {
                order.push(value);
                Vec::new()
            })
            .push(i);
    }

    let entries = order
        .into_iter()
        .map(|value| (value.clone(), table.take_rows(&groups[value])))
        .collect();
    Ok(Partitions { entries })
}
