//! Error types for operator composition and index permutations.

use thiserror::Error;

/// Errors raised by the linear algebra building blocks.
#[derive(Debug, Error)]
pub enum LinalgError {
    /// A vector or operator has the wrong length along one dimension.
    #[error("dimension mismatch in {context}: expected {expected}, got {found}")]
    DimensionMismatch {
        /// Where the mismatch was detected
        context: &'static str,
        /// Expected dimension
        expected: usize,
        /// Actual dimension provided
        found: usize,
    },

    /// Two operators combined in a sum have different shapes.
    #[error("shape mismatch: expected {expected:?}, got {found:?}")]
    ShapeMismatch {
        /// Shape of the first term
        expected: (usize, usize),
        /// Shape of the offending term
        found: (usize, usize),
    },

    /// A linear combination was built from no terms.
    #[error("linear combination needs at least one term")]
    EmptyCombination,

    /// An index map is not a bijection of `0..n`.
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),

    /// A sparse matrix entry lies outside the matrix.
    #[error("entry ({row}, {col}) outside a {num_rows}x{num_cols} matrix")]
    IndexOutOfBounds {
        /// Row of the entry
        row: usize,
        /// Column of the entry
        col: usize,
        /// Number of rows
        num_rows: usize,
        /// Number of columns
        num_cols: usize,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LinalgError>;
