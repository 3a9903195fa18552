//! A minimal column-labelled table for flattened results.
//!
//! [`Frame`] is what result trees flatten into: named columns, rows of
//! [`Cell`]s. It supports the handful of reshaping operations needed to
//! present portfolio results: concatenation with column union, column
//! insertion, filling missing cells and pivoting (see [`pivot`]).

pub mod pivot;

use std::fmt;
use std::hash::{Hash, Hasher};

pub use pivot::{PivotSpec, PivotTable};

use crate::types::{Date, FrameError};

/// One cell of a [`Frame`].
///
/// Numbers compare and hash by bit pattern so cells can serve as pivot
/// keys.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cell {
    /// No value.
    Missing,
    /// A label.
    Text(String),
    /// A number.
    Number(f64),
    /// A date.
    Date(Date),
}

impl Cell {
    /// Text cell from anything string-like.
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// The number held, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// The text held, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The date held, if any.
    pub fn as_date(&self) -> Option<Date> {
        match self {
            Cell::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether the cell is empty.
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Cell::Missing, Cell::Missing) => true,
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Number(a), Cell::Number(b)) => a.to_bits() == b.to_bits(),
            (Cell::Date(a), Cell::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Cell::Missing => {}
            Cell::Text(s) => s.hash(state),
            Cell::Number(v) => v.to_bits().hash(state),
            Cell::Date(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => write!(f, ""),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Date(d) => write!(f, "{}", d),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<Date> for Cell {
    fn from(d: Date) -> Self {
        Cell::Date(d)
    }
}

/// Rows of cells under named columns.
///
/// # Examples
///
/// ```
/// use pricer_core::frame::{Cell, Frame};
///
/// let a = Frame::new(vec!["name".into(), "value".into()], vec![vec!["a".into(), 1.0.into()]]);
/// let b = Frame::new(vec!["value".into()], vec![vec![2.0.into()]]);
/// let both = Frame::concat([a, b]);
///
/// assert_eq!(both.columns(), &["name", "value"]);
/// assert_eq!(both.get(1, "name"), Some(&Cell::Missing));
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    /// Creates a frame. Short rows are padded with [`Cell::Missing`].
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Missing);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Stacks frames, taking the union of their columns in first-appearance
    /// order.
    pub fn concat(frames: impl IntoIterator<Item = Frame>) -> Self {
        let frames: Vec<Frame> = frames.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for frame in &frames {
            for column in &frame.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for frame in frames {
            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|c| frame.column_index(c))
                .collect();
            for row in frame.rows {
                rows.push(
                    positions
                        .iter()
                        .map(|p| p.map_or(Cell::Missing, |i| row[i].clone()))
                        .collect(),
                );
            }
        }
        Self { columns, rows }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// A cell by row position and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of one column.
    pub fn column(&self, name: &str) -> Result<Vec<&Cell>, FrameError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Inserts a column holding the same cell in every row.
    ///
    /// Positions past the end append.
    pub fn insert_column(&mut self, position: usize, name: impl Into<String>, value: Cell) {
        let position = position.min(self.columns.len());
        self.columns.insert(position, name.into());
        for row in &mut self.rows {
            row.insert(position, value.clone());
        }
    }

    /// Replaces missing cells in the named columns with a marker.
    pub fn fill_missing(&mut self, columns: &[String], marker: &str) {
        let positions: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        for row in &mut self.rows {
            for &i in &positions {
                if row[i].is_missing() {
                    row[i] = Cell::text(marker);
                }
            }
        }
    }

    /// A frame restricted to the named columns, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Frame, FrameError> {
        let positions = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| FrameError::UnknownColumn(c.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Frame {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| positions.iter().map(|&i| r[i].clone()).collect())
                .collect(),
        })
    }

    /// Pivots the frame. See [`PivotSpec`].
    pub fn pivot(&self, spec: &PivotSpec) -> Result<PivotTable, FrameError> {
        pivot::pivot(self, spec)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::new(
            vec!["instrument_name".into(), "value".into()],
            vec![
                vec!["swap".into(), 1.0.into()],
                vec![Cell::Missing, 2.0.into()],
            ],
        )
    }

    #[test]
    fn test_new_pads_short_rows() {
        let f = Frame::new(vec!["a".into(), "b".into()], vec![vec![1.0.into()]]);
        assert_eq!(f.get(0, "b"), Some(&Cell::Missing));
    }

    #[test]
    fn test_insert_and_fill() {
        let mut f = frame();
        f.insert_column(0, "risk_measure", Cell::text("Price"));
        assert_eq!(f.columns(), &["risk_measure", "instrument_name", "value"]);
        f.fill_missing(&["instrument_name".to_string()], "N/A");
        assert_eq!(f.get(1, "instrument_name"), Some(&Cell::text("N/A")));
    }

    #[test]
    fn test_select_unknown_column() {
        let err = frame().select(&["dates"]).unwrap_err();
        assert_eq!(err, FrameError::UnknownColumn("dates".to_string()));
    }

    #[test]
    fn test_cell_hash_by_bits() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Cell::Number(1.0));
        set.insert(Cell::Number(1.0));
        set.insert(Cell::text("1"));
        assert_eq!(set.len(), 2);
    }
}
