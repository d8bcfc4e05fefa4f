//! Phase-timed kernel lifecycle
//!
//! A [`Kernel`] binds an assignment, its operands and a schedule to an
//! engine and moves through `Declared → Compiled → Assembled → Computed`.
//! Each phase is timed with a monotonic clock.
//!
//! ```
//! use tenbench_exec::{Kernel, KernelState, ReferenceEngine};
//! use tenbench_planner::Assignment;
//! use tenbench_sparse::FixtureBuilder;
//!
//! let a = FixtureBuilder::<i64>::new("A", vec![100]).entries(10).seed(7).build().unwrap();
//! let c = FixtureBuilder::<i64>::new("C", vec![100]).at(vec![0]).build().unwrap();
//! let stmt = Assignment::parse("D(i) = A(i) * C(i)").unwrap();
//!
//! let engine = ReferenceEngine::new();
//! let mut kernel = Kernel::new(&engine, stmt, vec![&a, &c]);
//! kernel.compile().unwrap();
//! kernel.assemble().unwrap();
//! kernel.compute().unwrap();
//!
//! assert_eq!(kernel.state(), KernelState::Computed);
//! assert!(kernel.output().unwrap().nonzeros().keys().all(|k| k == &vec![0]));
//! ```

use std::fmt;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tenbench_planner::{Assignment, Schedule};
use tenbench_sparse::{Scalar, SparseTensor};

use crate::engine::TensorEngine;
use crate::error::{ConfigurationError, ExecResult};

/// Lifecycle position of a kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelState {
    Declared,
    Compiled,
    Assembled,
    Computed,
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelState::Declared => "Declared",
            KernelState::Compiled => "Compiled",
            KernelState::Assembled => "Assembled",
            KernelState::Computed => "Computed",
        };
        f.write_str(name)
    }
}

/// Wall-clock duration of each phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseTimings {
    pub compile: Duration,
    pub assemble: Duration,
    pub compute: Duration,
}

impl PhaseTimings {
    pub fn total(&self) -> Duration {
        self.compile + self.assemble + self.compute
    }
}

/// One assignment bound to operands, a schedule and an engine
pub struct Kernel<'a, T, E>
where
    T: Scalar,
    E: TensorEngine<T>,
{
    engine: &'a E,
    assignment: Assignment,
    operands: Vec<&'a SparseTensor<T>>,
    schedule: Schedule,
    state: KernelState,
    program: Option<E::Program<'a>>,
    output: Option<SparseTensor<T>>,
    timings: PhaseTimings,
}

impl<'a, T, E> Kernel<'a, T, E>
where
    T: Scalar,
    E: TensorEngine<T>,
{
    /// Declare a kernel with the default schedule
    pub fn new(engine: &'a E, assignment: Assignment, operands: Vec<&'a SparseTensor<T>>) -> Self {
        Self {
            engine,
            assignment,
            operands,
            schedule: Schedule::default(),
            state: KernelState::Declared,
            program: None,
            output: None,
            timings: PhaseTimings::default(),
        }
    }

    /// Set the schedule applied at compile time
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn state(&self) -> KernelState {
        self.state
    }

    /// Timings of the phases run so far
    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    /// Compiled program, once compiled
    pub fn program(&self) -> Option<&E::Program<'a>> {
        self.program.as_ref()
    }

    /// Output tensor, once assembled
    pub fn output(&self) -> Option<&SparseTensor<T>> {
        self.output.as_ref()
    }

    pub fn into_output(self) -> Option<SparseTensor<T>> {
        self.output
    }

    fn require(&self, action: &'static str, allowed: &[KernelState]) -> ExecResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidTransition {
                action,
                state: self.state,
            }
            .into())
        }
    }

    /// Validate and lower the assignment
    pub fn compile(&mut self) -> ExecResult<Duration> {
        self.require("compile", &[KernelState::Declared])?;
        let _span = tracing::info_span!(
            "compile",
            kernel = %self.assignment.output(),
            engine = self.engine.name()
        )
        .entered();

        let start = Instant::now();
        let program = self
            .engine
            .compile(&self.assignment, &self.operands, &self.schedule)?;
        let elapsed = start.elapsed();

        self.program = Some(program);
        self.timings.compile = elapsed;
        self.state = KernelState::Compiled;
        tracing::debug!(elapsed_us = elapsed.as_micros() as u64, "compiled");
        Ok(elapsed)
    }

    /// Allocate output storage
    pub fn assemble(&mut self) -> ExecResult<Duration> {
        self.require("assemble", &[KernelState::Compiled])?;
        let _span = tracing::info_span!("assemble", kernel = %self.assignment.output()).entered();

        let program = self.program.as_ref().ok_or(ConfigurationError::InvalidTransition {
            action: "assemble",
            state: self.state,
        })?;
        let start = Instant::now();
        let output = self.engine.assemble(program)?;
        let elapsed = start.elapsed();

        tracing::debug!(
            elapsed_us = elapsed.as_micros() as u64,
            stored = output.stored_len(),
            "assembled"
        );
        self.output = Some(output);
        self.timings.assemble = elapsed;
        self.state = KernelState::Assembled;
        Ok(elapsed)
    }

    /// Compute output values, overwriting any earlier results
    pub fn compute(&mut self) -> ExecResult<Duration> {
        self.require("compute", &[KernelState::Assembled, KernelState::Computed])?;
        let _span = tracing::info_span!("compute", kernel = %self.assignment.output()).entered();

        let invalid = ConfigurationError::InvalidTransition {
            action: "compute",
            state: self.state,
        };
        let (Some(program), Some(output)) = (self.program.as_ref(), self.output.as_mut()) else {
            return Err(invalid.into());
        };

        let start = Instant::now();
        self.engine.compute(program, output)?;
        let elapsed = start.elapsed();

        self.timings.compute = elapsed;
        self.state = KernelState::Computed;
        tracing::debug!(elapsed_us = elapsed.as_micros() as u64, "computed");
        Ok(elapsed)
    }

    /// Run every remaining phase
    pub fn run(&mut self) -> ExecResult<PhaseTimings> {
        if self.state == KernelState::Declared {
            self.compile()?;
        }
        if self.state == KernelState::Compiled {
            self.assemble()?;
        }
        self.compute()?;
        Ok(self.timings)
    }
}

/// Compile, assemble and compute an assignment in one call
///
/// Without a schedule the default loop nest is used.
pub fn run<T, E>(
    engine: &E,
    assignment: &Assignment,
    operands: &[&SparseTensor<T>],
    schedule: Option<&Schedule>,
) -> ExecResult<(SparseTensor<T>, PhaseTimings)>
where
    T: Scalar,
    E: TensorEngine<T>,
{
    let mut kernel = Kernel::new(engine, assignment.clone(), operands.to_vec())
        .with_schedule(schedule.cloned().unwrap_or_default());
    let timings = kernel.run()?;
    let output = kernel
        .into_output()
        .ok_or(ConfigurationError::InvalidTransition {
            action: "read output of",
            state: KernelState::Declared,
        })?;
    Ok((output, timings))
}
