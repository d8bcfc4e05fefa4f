//! # tenbench-exec
//!
//! Kernel execution for the tenbench harness.
//!
//! This crate provides:
//! - [`TensorEngine`] - the capability trait every backend implements
//! - [`ReferenceEngine`] - sparse co-iteration honouring loop order, splits
//!   and a parallel outer loop with its race strategy
//! - [`DenseEngine`] - brute-force oracle over the full iteration space
//! - [`Kernel`] - the `Declared → Compiled → Assembled → Computed` lifecycle
//!   with per-phase [`PhaseTimings`]
//!
//! ```
//! use tenbench_exec::{run, ReferenceEngine};
//! use tenbench_planner::Assignment;
//! use tenbench_sparse::FixtureBuilder;
//!
//! let a = FixtureBuilder::<i64>::new("A", vec![64, 32]).entries(200).seed(1).build().unwrap();
//! let b = FixtureBuilder::<i64>::new("B", vec![64, 32]).entries(200).seed(2).build().unwrap();
//! let c = FixtureBuilder::<i64>::new("C", vec![32]).entries(16).seed(3).build().unwrap();
//!
//! let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)").unwrap();
//! let (d, timings) = run(&ReferenceEngine::new(), &stmt, &[&a, &b, &c], None).unwrap();
//!
//! assert_eq!(d.shape(), &[64]);
//! println!("compute took {:?}", timings.compute);
//! ```

#![deny(warnings)]

pub mod dense;
pub mod engine;
pub mod error;
pub mod kernel;
pub mod reference;

// Re-exports
pub use dense::{DenseEngine, DenseProgram};
pub use engine::TensorEngine;
pub use error::*;
pub use kernel::{run, Kernel, KernelState, PhaseTimings};
pub use reference::{ReferenceEngine, ReferenceProgram};
