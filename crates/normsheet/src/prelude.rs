//! Prelude module - common imports for normsheet users
//!
//! ```rust
//! use normsheet::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    CellError,
    CellRef,
    // Cell types
    CellValue,
    CommitOutcome,
    CustomFunctionDefinition,
    ElementValue,
    // Error types
    Error,
    ErrorPropagation,
    // Remote functions
    FunctionEvaluator,
    GridBounds,
    // Main types
    Instance,
    Recalculator,
    Result,
    Sheet,
    Template,
    Unavailable,
    WorkbookDocument,
    WorkbookStore,
};

#[cfg(feature = "http")]
pub use crate::{HttpEvaluatorConfig, HttpFunctionEvaluator};
