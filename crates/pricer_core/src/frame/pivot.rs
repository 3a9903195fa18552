//! Pivoting a [`Frame`] into a two-axis summary.

use std::fmt;

use indexmap::IndexMap;

use super::{Cell, Frame};
use crate::types::FrameError;

/// Which column holds the values and which columns label rows and
/// columns of the pivot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotSpec {
    /// Numeric column to aggregate.
    pub values: String,
    /// Columns forming the row key.
    pub index: Vec<String>,
    /// Columns forming the column key.
    pub columns: Vec<String>,
}

impl PivotSpec {
    /// Creates a pivot specification.
    pub fn new<I, C>(values: impl Into<String>, index: I, columns: C) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            values: values.into(),
            index: index.into_iter().map(Into::into).collect(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of a pivot: values summed per (row key, column key), keys in
/// first-appearance order.
#[derive(Clone, Debug, PartialEq)]
pub struct PivotTable {
    spec: PivotSpec,
    row_keys: Vec<Vec<Cell>>,
    column_keys: Vec<Vec<Cell>>,
    data: Vec<Vec<Option<f64>>>,
}

impl PivotTable {
    /// The specification this table was built from.
    pub fn spec(&self) -> &PivotSpec {
        &self.spec
    }

    /// Row keys, one cell per index column.
    pub fn row_keys(&self) -> &[Vec<Cell>] {
        &self.row_keys
    }

    /// Column keys, one cell per column column.
    pub fn column_keys(&self) -> &[Vec<Cell>] {
        &self.column_keys
    }

    /// The summed value at a row and column key, if any row contributed.
    pub fn get(&self, row: &[Cell], column: &[Cell]) -> Option<f64> {
        let r = self.row_keys.iter().position(|k| k.as_slice() == row)?;
        let c = self.column_keys.iter().position(|k| k.as_slice() == column)?;
        self.data[r][c]
    }

    /// Number of (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.row_keys.len(), self.column_keys.len())
    }
}

impl fmt::Display for PivotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = |key: &[Cell]| {
            key.iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join("/")
        };
        write!(f, "{}", self.spec.index.join("/"))?;
        for key in &self.column_keys {
            write!(f, "\t{}", label(key))?;
        }
        writeln!(f)?;
        for (key, row) in self.row_keys.iter().zip(&self.data) {
            write!(f, "{}", label(key))?;
            for value in row {
                match value {
                    Some(v) => write!(f, "\t{}", v)?,
                    None => write!(f, "\t")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub(super) fn pivot(frame: &Frame, spec: &PivotSpec) -> Result<PivotTable, FrameError> {
    let locate = |name: &String| {
        frame
            .column_index(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.clone()))
    };
    let value_idx = locate(&spec.values)?;
    let index_idx = spec.index.iter().map(locate).collect::<Result<Vec<_>, _>>()?;
    let column_idx = spec.columns.iter().map(locate).collect::<Result<Vec<_>, _>>()?;

    let mut rows: IndexMap<Vec<Cell>, usize> = IndexMap::new();
    let mut columns: IndexMap<Vec<Cell>, usize> = IndexMap::new();
    let mut cells: Vec<(usize, usize, f64)> = Vec::with_capacity(frame.len());

    for row in frame.rows() {
        let value = match &row[value_idx] {
            Cell::Number(v) => *v,
            Cell::Missing => continue,
            other => {
                return Err(FrameError::Pivot(format!(
                    "non-numeric value '{}' in column {}",
                    other, spec.values
                )))
            }
        };
        let row_key: Vec<Cell> = index_idx.iter().map(|&i| row[i].clone()).collect();
        let col_key: Vec<Cell> = column_idx.iter().map(|&i| row[i].clone()).collect();
        let next = rows.len();
        let r = *rows.entry(row_key).or_insert(next);
        let next = columns.len();
        let c = *columns.entry(col_key).or_insert(next);
        cells.push((r, c, value));
    }

    let mut data = vec![vec![None; columns.len()]; rows.len()];
    for (r, c, value) in cells {
        let slot: &mut Option<f64> = &mut data[r][c];
        *slot = Some(slot.unwrap_or(0.0) + value);
    }

    Ok(PivotTable {
        spec: spec.clone(),
        row_keys: rows.into_keys().collect(),
        column_keys: columns.into_keys().collect(),
        data,
    })
}
