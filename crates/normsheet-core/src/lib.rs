//! # normsheet-core
//!
//! Core data structures for the normsheet calculation engine.
//!
//! This crate provides the model the formula engine works on:
//! - [`CellValue`] - Computed cell values (numbers, text, error markers)
//! - [`CellRef`] and [`CellRange`] - Cell addressing and ranges
//! - [`Cell`] - A cell record: raw input, formula, computed value, style
//! - [`Sheet`], [`Instance`], [`WorkbookStore`] - Sheets grouped into named
//!   workbooks ("instances") that can reference each other
//! - [`Template`] - Reusable sheet layouts with element data injection
//! - [`WorkbookDocument`] - JSON import/export
//!
//! ## Example
//!
//! ```rust
//! use normsheet_core::{Instance, WorkbookStore};
//!
//! let mut store = WorkbookStore::new();
//! store.add_instance(Instance::new("design")).unwrap();
//!
//! let sheet = store.sheet_mut("design", "Hoja1").unwrap();
//! sheet.set_input("A1", "42").unwrap();
//! sheet.set_input("B1", "=A1*2").unwrap();
//! assert_eq!(sheet.cell_count(), 2);
//! ```

pub mod cell;
pub mod document;
pub mod error;
pub mod function;
pub mod grid;
pub mod instance;
pub mod sheet;
pub mod template;
pub mod workbook;

// Re-exports for convenience
pub use cell::{
    format_number, parse_number, Cell, CellError, CellRange, CellRef, CellStyle, CellValue,
};
pub use document::{InstanceDocument, SheetDocument, WorkbookDocument};
pub use error::{Error, Result};
pub use function::CustomFunctionDefinition;
pub use grid::GridBounds;
pub use instance::Instance;
pub use sheet::Sheet;
pub use template::{ElementValue, Template, TemplateStyles};
pub use workbook::WorkbookStore;

/// Default number of rows in a sheet
pub const DEFAULT_ROWS: u32 = 100;

/// Default number of columns in a sheet
pub const DEFAULT_COLS: u16 = 26;

/// Maximum number of rows in a sheet
pub const MAX_ROWS: u32 = 250;

/// Maximum number of columns in a sheet
pub const MAX_COLS: u16 = 50;

/// Column width in pixels when none is set
pub const DEFAULT_COLUMN_WIDTH: u32 = 96;

/// Row height in pixels when none is set
pub const DEFAULT_ROW_HEIGHT: u32 = 32;

/// Narrowest column width in pixels
pub const MIN_COLUMN_WIDTH: u32 = 60;

/// Lowest row height in pixels
pub const MIN_ROW_HEIGHT: u32 = 24;
