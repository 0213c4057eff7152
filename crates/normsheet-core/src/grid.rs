//! Grid dimensions

use serde::{Deserialize, Serialize};

use crate::cell::{CellRange, CellRef};
use crate::error::{Error, Result};
use crate::{DEFAULT_COLS, DEFAULT_ROWS, MAX_COLS, MAX_ROWS};

/// Addressable area of a sheet
///
/// References outside the bounds resolve to nothing and read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u16,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

impl GridBounds {
    /// Create bounds, validated against [`MAX_ROWS`] and [`MAX_COLS`]
    pub fn new(rows: u32, cols: u16) -> Result<Self> {
        if rows == 0 || rows > MAX_ROWS {
            return Err(Error::RowOutOfBounds(rows, MAX_ROWS));
        }
        if cols == 0 || cols > MAX_COLS {
            return Err(Error::ColumnOutOfBounds(cols, MAX_COLS));
        }
        Ok(Self { rows, cols })
    }

    /// The largest grid the engine supports
    pub fn max() -> Self {
        Self {
            rows: MAX_ROWS,
            cols: MAX_COLS,
        }
    }

    /// Check if a cell lies inside the grid
    pub fn contains(&self, cell: &CellRef) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Intersect a range with the grid; `None` if it lies entirely outside
    pub fn clip(&self, range: &CellRange) -> Option<CellRange> {
        if !self.contains(&range.start) {
            return None;
        }
        let end = CellRef::new(
            range.end.row.min(self.rows - 1),
            range.end.col.min(self.cols - 1),
        );
        Some(CellRange::new(range.start, end))
    }
}
