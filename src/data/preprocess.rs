use std::collections::BTreeSet;

use log::debug;
use serde::Deserialize;

use super::missing::{count_missing, Axis, Label};
use super::model::Table;

/// When the drop thresholds are derived from the table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Column threshold = `columns / 2` measured after the unused columns are
    /// gone; row threshold = `rows / 2` measured after the column drop.
    #[default]
    Recompute,
    /// Both thresholds fixed from the input shape before anything is dropped:
    /// column threshold = `rows / 2`, row threshold = `columns / 2`.
    Initial,
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

/// Missing-value cleaning for one dataset.
///
/// Each step consumes the preprocessor and hands back one holding the reduced
/// table, so steps chain without hidden mutation:
///
/// ```ignore
/// let table = Preprocessor::new(raw, &["ISO2"]).drop_unused_columns().dropna_columns(1).into_table();
/// ```
#[derive(Debug, Clone)]
pub struct Preprocessor {
    table: Table,
    unused_columns: BTreeSet<String>,
}

impl Preprocessor {
    pub fn new<S: AsRef<str>>(table: Table, unused_columns: &[S]) -> Self {
        Self {
            table,
            unused_columns: unused_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    /// Remove every unused column present in the table. Listed names the
    /// table does not have are ignored.
    pub fn drop_unused_columns(self) -> Self {
        let unused = &self.unused_columns;
        let table = self.table.retain_columns(|name| !unused.contains(name));
        debug!(
            "dropped {} unused columns",
            self.table.n_cols() - table.n_cols()
        );
        Self { table, ..self }
    }

    /// Remove every column with more than `threshold` missing cells.
    pub fn dropna_columns(self, threshold: usize) -> Self {
        let to_drop: BTreeSet<String> = count_missing(&self.table, Axis::PerColumn)
            .into_iter()
            .filter(|c| c.count > threshold)
            .filter_map(|c| match c.label {
                Label::Column(name) => Some(name),
                Label::Row(_) => None,
            })
            .collect();
        if !to_drop.is_empty() {
            debug!("threshold {threshold}: dropping columns {to_drop:?}");
        }
        let table = self.table.retain_columns(|name| !to_drop.contains(name));
        Self { table, ..self }
    }

    /// Remove every row with more than `threshold` missing cells. Survivors
    /// are renumbered from zero.
    pub fn dropna_rows(self, threshold: usize) -> Self {
        let keep: Vec<bool> = count_missing(&self.table, Axis::PerRow)
            .iter()
            .map(|c| c.count <= threshold)
            .collect();
        let table = self.table.retain_rows(|i| keep[i]);
        debug!(
            "threshold {threshold}: dropped {} rows",
            self.table.n_rows() - table.n_rows()
        );
        Self { table, ..self }
    }

    /// Full cleaning with thresholds recomputed from the shape before each step.
    pub fn transform(self) -> Table {
        self.transform_with(ThresholdPolicy::Recompute)
    }

    pub fn transform_with(self, policy: ThresholdPolicy) -> Table {
        match policy {
            ThresholdPolicy::Recompute => {
                let step = self.drop_unused_columns();
                let column_threshold = step.table.n_cols() / 2;
                let step = step.dropna_columns(column_threshold);
                let row_threshold = step.table.n_rows() / 2;
                step.dropna_rows(row_threshold).into_table()
            }
            ThresholdPolicy::Initial => {
                let (rows, cols) = self.table.shape();
                self.drop_unused_columns()
                    .dropna_columns(rows / 2)
                    .dropna_rows(cols / 2)
                    .into_table()
            }
        }
    }
}
