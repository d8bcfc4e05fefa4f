//! # tenbench
//!
//! Benchmarking harness for sparse tensor contractions.
//!
//! Experiments build seeded sparse fixtures, time the compile, assemble and
//! compute phases of one or more kernels over them, and report the timings
//! as text or CSV. This crate ties the workspace together:
//!
//! - [`sparse`] - fixtures and packed level storage
//! - [`planner`] - index notation, schedules and loop plans
//! - [`exec`] - engines and the phase-timed kernel lifecycle
//!
//! ## Quick Start
//!
//! ```
//! use tenbench::prelude::*;
//!
//! let config = ExperimentConfig::new("1")
//!     .fixture(FixtureSpec::new("A", vec![1000]).entries(100).seed(1))
//!     .fixture(FixtureSpec::new("B", vec![1000]).entries(100).seed(2))
//!     .fixture(FixtureSpec::new("C", vec![1000]).at(vec![0]))
//!     .kernel("D(i) = A(i) * B(i) * C(i)")
//!     .kernel("E(i) = C(i) * A(i) * B(i)");
//!
//! let report = run_experiment(&config, EngineKind::Reference)?;
//!
//! let mut reporter = Reporter::new(Vec::new());
//! reporter.report(&report)?;
//! let text = String::from_utf8(reporter.into_inner())?;
//! assert!(text.starts_with("Experiment # 1\nD(i) Time: "));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Binary
//!
//! `tenbench [EXPERIMENT]` runs a [`catalog`] entry (default `2`) and prints
//! its report. See [`HarnessConfig::from_env`] for the environment
//! variables it reads and [`telemetry`] for log output.

#![deny(warnings)]

pub use tenbench_exec as exec;
pub use tenbench_planner as planner;
pub use tenbench_sparse as sparse;

pub mod catalog;
pub mod config;
pub mod error;
pub mod report;
pub mod runner;
pub mod telemetry;

// Re-exports
pub use config::{EngineKind, ExperimentConfig, FixtureSpec, HarnessConfig, KernelSpec, Population};
pub use error::{HarnessError, HarnessResult};
pub use report::{ExperimentReport, KernelReport, PhaseStats, Reporter, Stats};
pub use runner::{run_experiment, run_with};

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```
    //! use tenbench::prelude::*;
    //!
    //! let harness = HarnessConfig::default();
    //! assert_eq!(harness.engine, EngineKind::Reference);
    //! ```

    // Harness
    pub use crate::catalog::{experiments, DEFAULT_EXPERIMENT};
    pub use crate::config::{EngineKind, ExperimentConfig, FixtureSpec, HarnessConfig};
    pub use crate::report::{ExperimentReport, Reporter};
    pub use crate::runner::run_experiment;

    // Execution
    pub use crate::exec::{run, DenseEngine, Kernel, PhaseTimings, ReferenceEngine, TensorEngine};

    // Planner
    pub use crate::planner::{Assignment, OutputRaceStrategy, ParallelUnit, Schedule};

    // Fixtures
    pub use crate::sparse::{FixtureBuilder, ModeFormat, SparseTensor};
}
