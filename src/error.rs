//! Error types for pipeline stages.
//!
//! Every stage either returns a complete new table or one of these errors.
//! File-level operations (loading, saving, exporting) use `anyhow` instead.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by cleaning, encoding and selection stages.
#[derive(Debug, Error)]
pub enum PrepError {
    /// A referenced column is absent from the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// The request cannot be satisfied for this table, e.g. a wrong column
    /// kind for the operation or `k` larger than the column count.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vector that must align with the table rows (or columns) has the
    /// wrong length.
    #[error("Shape mismatch: expected length {expected}, got {actual}")]
    ShapeMismatch {
        /// Length required by the table
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// Failure inside the underlying table storage.
    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl PrepError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PrepError::InvalidInput(message.into())
    }
}

/// Result alias for stage operations.
pub type PrepResult<T> = std::result::Result<T, PrepError>;
