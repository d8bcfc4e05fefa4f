//! Loop-nest schedules
//!
//! A [`Schedule`] is an ordered list of transformations applied to the
//! default loop nest of an assignment when it is lowered. Schedules change
//! how a kernel iterates, never what it computes.
//!
//! ```
//! use tenbench_planner::{OutputRaceStrategy, ParallelUnit, Schedule};
//!
//! let schedule = Schedule::new()
//!     .split("i", "i0", "i1", 32)
//!     .parallelize("i0", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces);
//!
//! assert_eq!(schedule.len(), 2);
//! assert_eq!(
//!     schedule.to_string(),
//!     "split(i, i0, i1, 32); parallelize(i0, CpuThread, NoRaces)"
//! );
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::index::IndexVar;

/// Hardware unit a parallel loop is distributed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParallelUnit {
    /// Worker threads of the engine's thread pool
    #[default]
    CpuThread,
}

/// How concurrent writes to one output location are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputRaceStrategy {
    /// Iterations write disjoint output locations
    #[default]
    NoRaces,
    /// Iterations accumulate into shared output under mutual exclusion
    Atomics,
    /// Iterations accumulate into private buffers reduced after the loop
    Temporary,
}

impl fmt::Display for ParallelUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParallelUnit::CpuThread => write!(f, "CpuThread"),
        }
    }
}

impl fmt::Display for OutputRaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputRaceStrategy::NoRaces => write!(f, "NoRaces"),
            OutputRaceStrategy::Atomics => write!(f, "Atomics"),
            OutputRaceStrategy::Temporary => write!(f, "Temporary"),
        }
    }
}

/// One schedule transformation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Transform {
    /// Permute the listed loops among the positions they occupy
    Reorder(Vec<IndexVar>),
    /// Replace `var` by `outer` iterating tiles of `factor` and `inner`
    /// iterating within a tile
    Split {
        var: IndexVar,
        outer: IndexVar,
        inner: IndexVar,
        factor: usize,
    },
    /// Distribute the iterations of `var`
    Parallelize {
        var: IndexVar,
        unit: ParallelUnit,
        strategy: OutputRaceStrategy,
    },
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Reorder(vars) => {
                let names: Vec<&str> = vars.iter().map(IndexVar::name).collect();
                write!(f, "reorder({})", names.join(", "))
            }
            Transform::Split {
                var,
                outer,
                inner,
                factor,
            } => write!(f, "split({}, {}, {}, {})", var, outer, inner, factor),
            Transform::Parallelize {
                var,
                unit,
                strategy,
            } => write!(f, "parallelize({}, {}, {})", var, unit, strategy),
        }
    }
}

/// Ordered list of transformations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schedule {
    transforms: Vec<Transform>,
}

impl Schedule {
    /// Empty schedule: the default loop nest
    pub fn new() -> Self {
        Self::default()
    }

    /// Reorder the listed loops
    pub fn reorder<I, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<IndexVar>,
    {
        self.transforms
            .push(Transform::Reorder(vars.into_iter().map(Into::into).collect()));
        self
    }

    /// Split a loop into an outer tile loop and an inner loop
    pub fn split(
        mut self,
        var: impl Into<IndexVar>,
        outer: impl Into<IndexVar>,
        inner: impl Into<IndexVar>,
        factor: usize,
    ) -> Self {
        self.transforms.push(Transform::Split {
            var: var.into(),
            outer: outer.into(),
            inner: inner.into(),
            factor,
        });
        self
    }

    /// Run a loop in parallel
    pub fn parallelize(
        mut self,
        var: impl Into<IndexVar>,
        unit: ParallelUnit,
        strategy: OutputRaceStrategy,
    ) -> Self {
        self.transforms.push(Transform::Parallelize {
            var: var.into(),
            unit,
            strategy,
        });
        self
    }

    /// Append an already built transformation
    pub fn with(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transforms.is_empty() {
            return write!(f, "default");
        }
        for (k, t) in self.transforms.iter().enumerate() {
            if k > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", t)?;
        }
        Ok(())
    }
}
