//! Error types for normsheet-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in normsheet-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (max: {1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (max: {1})")]
    ColumnOutOfBounds(u16, u16),

    /// Instance not found by id
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Duplicate instance id
    #[error("Instance already exists: {0}")]
    DuplicateInstance(String),

    /// Sheet not found by id or name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// Duplicate sheet id
    #[error("Sheet id already exists: {0}")]
    DuplicateSheetId(String),

    /// Attempt to delete the only sheet of an instance
    #[error("Cannot delete the last sheet of instance {0}")]
    LastSheet(String),

    /// Merged cell conflict
    #[error("Range {0} overlaps an existing merged region")]
    MergedCellConflict(String),

    /// Malformed JSON document
    #[error("Invalid document: {0}")]
    Json(#[from] serde_json::Error),
}
