use super::model::Table;

/// Direction along which missing cells are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// One count per column.
    PerColumn,
    /// One count per row.
    PerRow,
}

/// What a [`MissingCount`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
    Column(String),
    Row(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingCount {
    pub label: Label,
    pub count: usize,
}

/// Count missing cells (`Null` or `NaN`) per column or per row, in table order.
pub fn count_missing(table: &Table, axis: Axis) -> Vec<MissingCount> {
    match axis {
        Axis::PerColumn => table
            .columns()
            .map(|(name, values)| MissingCount {
                label: Label::Column(name.to_string()),
                count: values.iter().filter(|v| v.is_missing()).count(),
            })
            .collect(),
        Axis::PerRow => (0..table.n_rows())
            .map(|i| MissingCount {
                label: Label::Row(i),
                count: table.row(i).filter(|v| v.is_missing()).count(),
            })
            .collect(),
    }
}
