//! # tenbench-sparse
//!
//! Sparse tensor fixtures for the tenbench harness.
//!
//! This crate provides:
//! - Per-mode storage formats (dense or compressed levels, any level order)
//! - An insert-then-pack [`SparseTensor`] with configurable duplicate merging
//! - Packed [`LevelStorage`] with fiber access for co-iterating engines
//! - [`FixtureBuilder`] for seeded, randomly populated fixtures
//!
//! ```
//! use tenbench_sparse::FixtureBuilder;
//!
//! let c = FixtureBuilder::<i64>::new("C", vec![100]).at(vec![0]).build().unwrap();
//! assert_eq!(c.get(&[0]), Some(12));
//! ```

#![deny(warnings)]

pub mod coo;
pub mod error;
pub mod fixture;
pub mod format;
pub mod levels;
pub mod scalar;
pub mod tensor;

// Re-exports
pub use coo::{CooBuffer, DuplicatePolicy};
pub use error::*;
pub use fixture::{build_fixture, capacity, FixtureBuilder, DEFAULT_FIXTURE_VALUE, DEFAULT_SEED};
pub use format::{Format, ModeFormat};
pub use levels::{Fiber, Level, LevelStorage, Locator};
pub use scalar::Scalar;
pub use tensor::SparseTensor;
