//! Kernel errors
//!
//! Errors fall into two classes. [`ConfigurationError`] covers everything
//! detectable before any output is produced: bad shapes, unknown index
//! variables, malformed schedules, lifecycle misuse. [`ExecutionError`]
//! covers failures while assembling or computing. Neither is retried.

use thiserror::Error;

use tenbench_planner::PlanError;
use tenbench_sparse::SparseError;

use crate::kernel::KernelState;

/// Error raised by a kernel or an engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl ExecError {
    /// Whether the error was found before execution started
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExecError::Configuration(_))
    }
}

impl From<PlanError> for ExecError {
    fn from(err: PlanError) -> Self {
        ExecError::Configuration(ConfigurationError::Plan(err))
    }
}

/// Invalid assignment, operands, schedule or lifecycle use
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("Operand '{name}': {source}")]
    Operand { name: String, source: SparseError },

    #[error("Operand '{0}' is bound more than once")]
    DuplicateOperand(String),

    #[error("Cannot {action} a kernel in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: KernelState,
    },
}

/// Failure during assemble or compute
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Output coordinate {0:?} is missing from assembled storage")]
    MissingOutputCoordinate(Vec<usize>),

    #[error("Output '{got}' does not match compiled output '{expected}'")]
    OutputMismatch { expected: String, got: String },

    #[error("Output storage: {0}")]
    Storage(SparseError),

    #[error("Parallel worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Result type alias for kernel operations
pub type ExecResult<T> = Result<T, ExecError>;
