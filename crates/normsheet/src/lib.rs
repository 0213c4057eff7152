//! # normsheet
//!
//! A spreadsheet engine for documents split into instances and sheets.
//!
//! ## Features
//!
//! - Formulas that reference other sheets (`Hoja2!A1`) and other instances
//!   (`cost:Hoja1!B5`)
//! - Incremental recalculation of the cells depending on an edit
//! - SUM, AVERAGE, VLOOKUP/BUSCARV, MATCH/COINCIDIR and CHOOSE/ELEGIR
//! - Custom functions evaluated by a remote service (`http` feature)
//! - Templates with element data injection
//! - JSON import and export of whole workbooks
//!
//! ## Example
//!
//! ```rust
//! use normsheet::prelude::*;
//!
//! let mut store = WorkbookStore::new();
//! store.add_instance(Instance::new("design")).unwrap();
//! store.add_instance(Instance::new("cost")).unwrap();
//! let mut calc = Recalculator::new(store);
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     calc.edit_cell("cost", "Hoja1", "B5", "40", &Unavailable).await.unwrap();
//!     calc.edit_cell("design", "Hoja1", "A1", "=cost:Hoja1!B5*2", &Unavailable).await.unwrap();
//! });
//! assert_eq!(calc.computed("design", "Hoja1", "A1").unwrap(), CellValue::Number(80.0));
//! ```

pub mod calculation;
pub mod prelude;
#[cfg(feature = "http")]
pub mod remote;

pub use calculation::{
    CalculationOptions, CalculationStats, CommitOutcome, PassResult, PendingPass, Recalculator,
};
#[cfg(feature = "http")]
pub use remote::{HttpEvaluatorConfig, HttpFunctionEvaluator};

// Re-export core types
pub use normsheet_core::{
    Cell, CellError, CellRange, CellRef, CellStyle, CellValue, CustomFunctionDefinition,
    ElementValue, Error, GridBounds, Instance, InstanceDocument, Result, Sheet, SheetDocument,
    Template, TemplateStyles, WorkbookDocument, WorkbookStore, DEFAULT_COLS, DEFAULT_ROWS,
    MAX_COLS, MAX_ROWS,
};

// Re-export formula types
pub use normsheet_formula::{
    evaluate, parse_formula, resolve, BridgeError, CustomFunctionBridge, CustomFunctionRegistry,
    DependencyGraph, ErrorPropagation, EvaluationContext, EvaluationRequest, EvaluationResponse,
    FormulaError, FormulaExpr, FormulaResult, FormulaValue, FunctionEvaluator, ResolvedRef,
    Unavailable,
};
