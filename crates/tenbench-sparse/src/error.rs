//! Error types for fixture construction and level storage
//!
//! # Design
//!
//! - **`SparseError`**: top-level enum returned by every fallible operation
//! - **`ValidationError`**: shape, format and density checks done up front
//! - **`IndexError`**: coordinates that do not fit the tensor
//! - **`StateError`**: misuse of the insert/pack lifecycle
//!
//! # Examples
//!
//! ```
//! use tenbench_sparse::error::{SparseError, ValidationError};
//!
//! fn validate_shape(shape: &[usize]) -> Result<(), SparseError> {
//!     if shape.is_empty() {
//!         return Err(SparseError::Validation(ValidationError::EmptyShape));
//!     }
//!     if shape.contains(&0) {
//!         return Err(SparseError::Validation(ValidationError::ZeroInShape));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_shape(&[3, 0]).is_err());
//! ```

use thiserror::Error;

/// Top-level error type for all sparse tensor operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SparseError {
    /// Validation errors (shape, format, density)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Index errors
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// Lifecycle errors (insert after pack, read before pack)
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Validation errors for tensor properties
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Shape cannot be empty")]
    EmptyShape,

    #[error("Shape cannot contain zeros")]
    ZeroInShape,

    #[error("Format has {formats} modes but shape has {rank} dimensions")]
    FormatRankMismatch { formats: usize, rank: usize },

    #[error("Invalid mode order {order:?} for rank {rank}")]
    InvalidModeOrder { order: Vec<usize>, rank: usize },

    #[error("Density must lie in [0, 1], got {0}")]
    InvalidDensity(f64),
}

/// Index errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("Index out of bounds: index {index:?} exceeds shape {shape:?}")]
    OutOfBounds {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    #[error("Index dimension mismatch: expected {expected}D, got {got}D")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Insert/pack lifecycle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Tensor '{0}' is already packed; inserts are no longer accepted")]
    AlreadyPacked(String),

    #[error("Tensor '{0}' has not been packed")]
    NotPacked(String),
}

/// Result type alias for sparse tensor operations
pub type SparseResult<T> = Result<T, SparseError>;

impl SparseError {
    /// Create an index out of bounds error
    pub fn index_out_of_bounds(index: Vec<usize>, shape: Vec<usize>) -> Self {
        SparseError::Index(IndexError::OutOfBounds { index, shape })
    }

    /// Create a dimension mismatch error
    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        SparseError::Index(IndexError::DimensionMismatch { expected, got })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = ValidationError::EmptyShape;
        assert_eq!(err.to_string(), "Shape cannot be empty");
    }

    #[test]
    fn test_sparse_error_from_validation() {
        let err: SparseError = ValidationError::ZeroInShape.into();
        assert!(matches!(err, SparseError::Validation(_)));
    }

    #[test]
    fn test_index_error() {
        let err = SparseError::index_out_of_bounds(vec![1, 2, 3], vec![1, 2, 2]);
        assert_eq!(
            err.to_string(),
            "Index error: Index out of bounds: index [1, 2, 3] exceeds shape [1, 2, 2]"
        );
    }

    #[test]
    fn test_state_error() {
        let err: SparseError = StateError::AlreadyPacked("A".to_string()).into();
        assert!(err.to_string().contains("already packed"));
    }
}
