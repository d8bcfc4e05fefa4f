//! # tenbench-planner
//!
//! Index notation, schedules and loop-nest lowering for sparse tensor
//! contractions.
//!
//! ## Features
//!
//! - **Index Notation**: [`IndexVar`], [`Access`] and [`Assignment`], with a
//!   parser for the `D(i) = A(i,j) * B(i,j) * C(j)` syntax
//! - **Schedules**: loop reorder, split and parallelize transformations with
//!   an output race strategy
//! - **Lowering**: validation of shapes and schedules, and a concrete
//!   [`LoopPlan`] telling an engine which operand levels each loop
//!   co-iterates
//!
//! ## Quick Start
//!
//! ```
//! use tenbench_planner::{lower, Assignment, OutputRaceStrategy, ParallelUnit, Schedule, TensorInfo};
//!
//! let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)").unwrap();
//! let operands = [
//!     TensorInfo::new("A", vec![1000, 100], vec![0, 1]),
//!     TensorInfo::new("B", vec![1000, 100], vec![0, 1]),
//!     TensorInfo::new("C", vec![100], vec![0]),
//! ];
//!
//! let schedule = Schedule::new()
//!     .split("i", "i0", "i1", 64)
//!     .parallelize("i0", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces);
//!
//! let plan = lower(&stmt, &operands, &schedule).unwrap();
//! assert_eq!(plan.loop_names(), vec!["i0", "i1", "j"]);
//! println!("{}", plan);
//! ```
//!
//! ## Schedules
//!
//! Transformations are applied in order to the default loop nest (output
//! variables, then summed-out variables). Lowering rejects:
//!
//! - unknown loop names
//! - split factors of zero, or splits of an already split loop
//! - an inner split loop ordered before its outer loop
//! - a parallel loop that is not outermost
//! - [`OutputRaceStrategy::NoRaces`] on a summed-out variable

#![deny(warnings)]

pub mod error;
pub mod index;
pub mod lower;
pub mod parser;
pub mod schedule;

#[cfg(test)]
mod property_tests;

// Re-exports
pub use error::*;
pub use index::{Access, Assignment, IndexVar};
pub use lower::{lower, Loop, LoopKind, LoopPlan, OperandPlan, ParallelLoop, Participant, TensorInfo};
pub use schedule::{OutputRaceStrategy, ParallelUnit, Schedule, Transform};
