//! Errors raised while parsing, scheduling and lowering assignments

use thiserror::Error;

use crate::index::IndexVar;

/// Planner error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Assignment has no right-hand side operands")]
    EmptyExpression,

    #[error("Index variable '{var}' appears twice in access to '{tensor}'")]
    RepeatedIndexVar { tensor: String, var: IndexVar },

    #[error("Output index variable '{0}' does not appear on the right-hand side")]
    UnboundOutputVar(IndexVar),

    #[error("Output tensor '{0}' also appears on the right-hand side")]
    OutputOnRhs(String),

    #[error("No tensor named '{0}' is bound to the assignment")]
    UnknownTensor(String),

    #[error("Tensor '{tensor}' has rank {rank} but is accessed with {got} index variables")]
    ArityMismatch {
        tensor: String,
        rank: usize,
        got: usize,
    },

    #[error("Dimension mismatch for index variable '{var}': {tensor} has extent {got}, expected {expected}")]
    ShapeMismatch {
        var: IndexVar,
        tensor: String,
        expected: usize,
        got: usize,
    },

    #[error("Schedule refers to unknown index variable '{0}'")]
    UnknownIndexVar(IndexVar),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("{order:?} is not a permutation of {len} factors")]
    InvalidPermutation { order: Vec<usize>, len: usize },
}

/// Result type alias for planner operations
pub type PlanResult<T> = Result<T, PlanError>;

impl PlanError {
    pub(crate) fn parse(position: usize, message: impl Into<String>) -> Self {
        PlanError::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn schedule(message: impl Into<String>) -> Self {
        PlanError::InvalidSchedule(message.into())
    }
}
