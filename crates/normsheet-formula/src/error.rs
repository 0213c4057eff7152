//! Formula error types

use normsheet_core::CellError;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing or evaluation
///
/// These never escape a cell: [`FormulaError::to_cell_error`] turns them into the
/// marker stored as the cell's computed value.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
}

impl FormulaError {
    /// Marker stored in the cell for this failure
    pub fn to_cell_error(&self) -> CellError {
        match self {
            FormulaError::UnknownFunction(_) => CellError::FunctionNotFound,
            FormulaError::Parse(_) | FormulaError::Evaluation(_) => CellError::Error,
        }
    }
}
