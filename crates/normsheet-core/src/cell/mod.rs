//! Cell-related types and utilities
//!
//! This module contains:
//! - [`CellValue`] - The computed value of a cell
//! - [`CellRef`] - A cell's location (e.g., "A1")
//! - [`CellRange`] - A range of cells (e.g., "A1:B10")
//! - [`Cell`] - Complete cell record: input, formula, computed value and style

mod address;
mod data;
mod value;

pub use address::{CellRange, CellRangeIterator, CellRef};
pub use data::{Cell, CellStyle};
pub use value::{format_number, parse_number, CellError, CellValue};
