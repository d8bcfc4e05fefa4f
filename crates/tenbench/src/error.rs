//! Harness errors

use thiserror::Error;

use tenbench_exec::ExecError;
use tenbench_planner::PlanError;
use tenbench_sparse::SparseError;

/// Error raised while configuring or running experiments
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid value '{value}' for {setting}: expected {expected}")]
    InvalidSetting {
        setting: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown experiment '{name}' (known: {known})")]
    UnknownExperiment { name: String, known: String },

    #[error("Experiment '{0}' declares no kernels")]
    NoKernels(String),

    #[error("Fixture '{name}' could not be built: {source}")]
    Fixture {
        name: String,
        #[source]
        source: SparseError,
    },

    #[error("Kernel '{kernel}' is malformed: {source}")]
    Statement {
        kernel: String,
        #[source]
        source: PlanError,
    },

    #[error("Kernel '{kernel}' failed: {source}")]
    Kernel {
        kernel: String,
        #[source]
        source: ExecError,
    },

    #[error("Report output failed: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub(crate) fn setting(setting: &str, value: &str, expected: &'static str) -> Self {
        HarnessError::InvalidSetting {
            setting: setting.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    /// True when the failure came from configuration rather than a run
    pub fn is_configuration(&self) -> bool {
        match self {
            HarnessError::Kernel { source, .. } => source.is_configuration(),
            HarnessError::Io(_) => false,
            _ => true,
        }
    }
}

/// Result type alias for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;
