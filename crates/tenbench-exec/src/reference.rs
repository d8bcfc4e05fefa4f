//! Sparse co-iteration engine
//!
//! Walks the loop nest of a [`LoopPlan`] over the packed level storage of the
//! operands. At every binding loop the fibers of the participating operand
//! levels are intersected: the shortest fiber drives, the others are probed.
//! Outer split loops only visit tiles that every compressed participant
//! populates.
//!
//! # Parallel loops
//!
//! When the outermost loop is parallelized, its iterations are expanded up
//! front and distributed over the rayon pool of `scirs2_core::parallel_ops`.
//! Writes to the output follow the loop's
//! [`OutputRaceStrategy`](tenbench_planner::OutputRaceStrategy):
//!
//! - `NoRaces`: every iteration collects its own contributions; iterations
//!   touch disjoint output positions, so they are added without locking
//! - `Atomics`: contributions are flushed into the shared output under a
//!   `parking_lot::Mutex`, one batch per iteration
//! - `Temporary`: each worker folds into a private value buffer and the
//!   buffers are summed after the loop

use std::borrow::Cow;

use tenbench_planner::{Assignment, Loop, LoopKind, LoopPlan, Schedule};
use tenbench_sparse::{Fiber, Format, LevelStorage, Scalar, SparseTensor};

use crate::engine::{bind_operands, check_output, output_coord, TensorEngine};
use crate::error::{ExecResult, ExecutionError};

#[cfg(feature = "parallel")]
use scirs2_core::parallel_ops::*;
#[cfg(feature = "parallel")]
use tenbench_planner::OutputRaceStrategy;
#[cfg(feature = "parallel")]
use tenbench_sparse::Locator;

/// Engine co-iterating compressed levels under a schedule
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Compiled assignment for [`ReferenceEngine`]
#[derive(Debug, Clone)]
pub struct ReferenceProgram<'a, T: Scalar> {
    plan: LoopPlan,
    operands: Vec<Cow<'a, SparseTensor<T>>>,
}

impl<'a, T: Scalar> ReferenceProgram<'a, T> {
    pub fn plan(&self) -> &LoopPlan {
        &self.plan
    }

    /// Number of operands repacked to match the loop order
    pub fn repacked(&self) -> usize {
        self.operands
            .iter()
            .filter(|op| matches!(op, Cow::Owned(_)))
            .count()
    }

    fn storages(&self) -> ExecResult<Vec<&LevelStorage<T>>> {
        self.operands
            .iter()
            .map(|op| op.storage().map_err(|e| ExecutionError::Storage(e).into()))
            .collect()
    }
}

impl<T: Scalar> TensorEngine<T> for ReferenceEngine {
    type Program<'a> = ReferenceProgram<'a, T>
    where
        T: 'a;

    fn name(&self) -> &'static str {
        "reference"
    }

    fn compile<'a>(
        &self,
        assignment: &Assignment,
        operands: &[&'a SparseTensor<T>],
        schedule: &Schedule,
    ) -> ExecResult<Self::Program<'a>> {
        let (plan, operands) = bind_operands(assignment, operands, schedule, true)?;
        Ok(ReferenceProgram { plan, operands })
    }

    fn assemble(&self, program: &Self::Program<'_>) -> ExecResult<SparseTensor<T>> {
        let plan = &program.plan;
        let storages = program.storages()?;
        let rank = plan.output_vars().len();

        let mut coords: Vec<Vec<usize>> = Vec::new();
        let mut out = vec![0; rank];
        let mut cursor = Cursor::new(plan, &storages);
        cursor.visit(0, &mut |point: &[usize], _| {
            output_coord(plan, point, &mut out);
            if coords.last() != Some(&out) {
                coords.push(out.clone());
            }
        });

        coords.sort_unstable();
        coords.dedup();
        let entries: Vec<(Vec<usize>, T)> = coords.into_iter().map(|c| (c, T::zero())).collect();

        let format = Format::sparse(rank);
        let storage = LevelStorage::from_sorted(&plan.output_shape(), &format, &entries);
        Ok(SparseTensor::from_storage(plan.output(), format, storage))
    }

    fn compute(&self, program: &Self::Program<'_>, output: &mut SparseTensor<T>) -> ExecResult<()> {
        let plan = &program.plan;
        check_output(plan, output)?;
        let storages = program.storages()?;

        let (target, vals) = output
            .storage_mut()
            .map_err(ExecutionError::Storage)?
            .locator_mut();
        vals.iter_mut().for_each(|v| *v = T::zero());

        match plan.parallel() {
            #[cfg(feature = "parallel")]
            Some(directive) if !plan.loops().is_empty() => {
                compute_parallel(plan, &storages, target, vals, directive.strategy)
            }
            _ => {
                let mut out = vec![0; plan.output_vars().len()];
                let mut missing = None;
                Cursor::new(plan, &storages).visit(0, &mut |point: &[usize], value: T| {
                    if missing.is_some() {
                        return;
                    }
                    output_coord(plan, point, &mut out);
                    match target.locate(&out) {
                        Some(p) => vals[p] += value,
                        None => missing = Some(out.clone()),
                    }
                });
                match missing {
                    Some(coord) => Err(ExecutionError::MissingOutputCoordinate(coord).into()),
                    None => Ok(()),
                }
            }
        }
    }
}

/// Iteration state of one walk through the loop nest
#[derive(Clone)]
struct Cursor<'p, T> {
    plan: &'p LoopPlan,
    storages: &'p [&'p LevelStorage<T>],
    /// Bound coordinate per index variable
    coords: Vec<usize>,
    /// Current tile per split variable
    tiles: Vec<usize>,
    /// Current parent position per operand
    positions: Vec<usize>,
}

/// One iteration of a loop: the value it binds and the participant positions
#[derive(Debug, Clone)]
struct Step {
    value: usize,
    positions: Vec<usize>,
}

impl<'p, T: Scalar> Cursor<'p, T> {
    fn new(plan: &'p LoopPlan, storages: &'p [&'p LevelStorage<T>]) -> Self {
        let nvars = plan.vars().len();
        Self {
            plan,
            storages,
            coords: vec![0; nvars],
            tiles: vec![0; nvars],
            positions: vec![0; storages.len()],
        }
    }

    fn fibers(&self, l: &Loop) -> Vec<Fiber<'p>> {
        l.participants
            .iter()
            .map(|p| {
                let storage: &'p LevelStorage<T> = self.storages[p.operand];
                storage.levels()[p.level].fiber(self.positions[p.operand])
            })
            .collect()
    }

    /// Coordinate range a binding loop may take
    fn bounds(&self, l: &Loop) -> (usize, usize) {
        let extent = self.plan.extents()[l.source];
        match l.kind {
            LoopKind::Inner { factor } => {
                let lo = self.tiles[l.source].saturating_mul(factor);
                (lo.min(extent), lo.saturating_add(factor).min(extent))
            }
            _ => (0, extent),
        }
    }

    /// Tiles of an outer loop holding entries of every compressed participant
    fn tiles_of(&self, l: &Loop, factor: usize) -> Vec<usize> {
        let extent = self.plan.extents()[l.source];
        let compressed: Vec<Fiber<'p>> = self
            .fibers(l)
            .into_iter()
            .filter(|f| matches!(f, Fiber::Compressed { .. }))
            .collect();

        let Some(driver) = compressed.iter().min_by_key(|f| f.len()) else {
            return (0..extent.div_ceil(factor)).collect();
        };

        let mut tiles: Vec<usize> = driver.iter().map(|(c, _)| c / factor).collect();
        tiles.dedup();
        tiles.retain(|&t| {
            let (lo, hi) = (t * factor, (t + 1) * factor);
            compressed.iter().all(|f| !f.span(lo, hi).is_empty())
        });
        tiles
    }

    /// All iterations of the loop at `depth` from the current state
    fn steps(&self, depth: usize) -> Vec<Step> {
        let l = &self.plan.loops()[depth];
        if let LoopKind::Outer { factor } = l.kind {
            return self
                .tiles_of(l, factor)
                .into_iter()
                .map(|value| Step {
                    value,
                    positions: Vec::new(),
                })
                .collect();
        }

        let (lo, hi) = self.bounds(l);
        let fibers = self.fibers(l);
        let mut steps = Vec::new();
        let mut buf = vec![0; fibers.len()];
        intersect(&fibers, lo, hi, &mut buf, |c, positions| {
            steps.push(Step {
                value: c,
                positions: positions.to_vec(),
            })
        });
        steps
    }

    fn apply(&mut self, depth: usize, step: &Step) {
        let plan = self.plan;
        let l = &plan.loops()[depth];
        if l.kind.binds() {
            self.coords[l.source] = step.value;
            for (p, &pos) in l.participants.iter().zip(&step.positions) {
                self.positions[p.operand] = pos;
            }
        } else {
            self.tiles[l.source] = step.value;
        }
    }

    /// Visit every iteration point below `depth`, passing the bound
    /// coordinates and the product of the operand values
    fn visit<F>(&mut self, depth: usize, sink: &mut F)
    where
        F: FnMut(&[usize], T),
    {
        let plan = self.plan;
        let Some(l) = plan.loops().get(depth) else {
            let mut product = T::one();
            for (op, storage) in self.storages.iter().enumerate() {
                product = product * storage.vals()[self.positions[op]];
            }
            sink(&self.coords, product);
            return;
        };

        if let LoopKind::Outer { factor } = l.kind {
            for t in self.tiles_of(l, factor) {
                self.tiles[l.source] = t;
                self.visit(depth + 1, sink);
            }
            return;
        }

        let (lo, hi) = self.bounds(l);
        if l.participants.is_empty() {
            for c in lo..hi {
                self.coords[l.source] = c;
                self.visit(depth + 1, sink);
            }
            return;
        }

        let fibers = self.fibers(l);
        let saved: Vec<usize> = l
            .participants
            .iter()
            .map(|p| self.positions[p.operand])
            .collect();
        let mut buf = vec![0; fibers.len()];

        let driver = driver_of(&fibers, lo, hi);
        for k in fibers[driver].span(lo, hi) {
            let c = fibers[driver].coord(k);
            if !probe(&fibers, driver, k, c, &mut buf) {
                continue;
            }
            self.coords[l.source] = c;
            for (p, &pos) in l.participants.iter().zip(&buf) {
                self.positions[p.operand] = pos;
            }
            self.visit(depth + 1, sink);
        }

        for (p, pos) in l.participants.iter().zip(saved) {
            self.positions[p.operand] = pos;
        }
    }
}

/// Participant with the fewest children in `lo..hi`
fn driver_of(fibers: &[Fiber<'_>], lo: usize, hi: usize) -> usize {
    (0..fibers.len())
        .min_by_key(|&n| fibers[n].span(lo, hi).len())
        .unwrap_or(0)
}

/// Look `c` up in every non-driving fiber, writing child positions to `buf`
#[inline]
fn probe(fibers: &[Fiber<'_>], driver: usize, k: usize, c: usize, buf: &mut [usize]) -> bool {
    for (n, fiber) in fibers.iter().enumerate() {
        buf[n] = if n == driver {
            fiber.position(k)
        } else {
            match fiber.find(c) {
                Some(pos) => pos,
                None => return false,
            }
        };
    }
    true
}

/// Call `f` for every coordinate in `lo..hi` present in all fibers
fn intersect<F>(fibers: &[Fiber<'_>], lo: usize, hi: usize, buf: &mut [usize], mut f: F)
where
    F: FnMut(usize, &[usize]),
{
    if fibers.is_empty() {
        for c in lo..hi {
            f(c, buf);
        }
        return;
    }
    let driver = driver_of(fibers, lo, hi);
    for k in fibers[driver].span(lo, hi) {
        let c = fibers[driver].coord(k);
        if probe(fibers, driver, k, c, buf) {
            f(c, buf);
        }
    }
}

/// Contributions of one outermost iteration as `(output position, value)`
#[cfg(feature = "parallel")]
fn run_step<T: Scalar>(
    base: &Cursor<'_, T>,
    target: Locator<'_>,
    step: &Step,
) -> Result<Vec<(usize, T)>, ExecutionError> {
    let plan = base.plan;
    let mut cursor = base.clone();
    cursor.apply(0, step);

    let mut out = vec![0; plan.output_vars().len()];
    let mut batch = Vec::new();
    let mut missing = None;
    cursor.visit(1, &mut |point: &[usize], value: T| {
        if missing.is_some() {
            return;
        }
        output_coord(plan, point, &mut out);
        match target.locate(&out) {
            Some(p) => batch.push((p, value)),
            None => missing = Some(out.clone()),
        }
    });

    match missing {
        Some(coord) => Err(ExecutionError::MissingOutputCoordinate(coord)),
        None => Ok(batch),
    }
}

#[cfg(feature = "parallel")]
fn compute_parallel<T: Scalar>(
    plan: &LoopPlan,
    storages: &[&LevelStorage<T>],
    target: Locator<'_>,
    vals: &mut [T],
    strategy: OutputRaceStrategy,
) -> ExecResult<()> {
    let base = Cursor::new(plan, storages);
    let steps = base.steps(0);
    let len = vals.len();

    tracing::debug!(
        iterations = steps.len(),
        strategy = %strategy,
        "parallel outer loop"
    );

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| match strategy {
        OutputRaceStrategy::NoRaces => {
            let batches = steps
                .par_iter()
                .map(|step| run_step(&base, target, step))
                .collect::<Result<Vec<_>, _>>()?;
            for (p, value) in batches.into_iter().flatten() {
                vals[p] += value;
            }
            Ok::<(), ExecutionError>(())
        }
        OutputRaceStrategy::Atomics => {
            let shared = parking_lot::Mutex::new(&mut *vals);
            steps.par_iter().try_for_each(|step| {
                let batch = run_step(&base, target, step)?;
                let mut guard = shared.lock();
                for (p, value) in batch {
                    guard[p] += value;
                }
                Ok::<(), ExecutionError>(())
            })
        }
        OutputRaceStrategy::Temporary => {
            let total = steps
                .par_iter()
                .try_fold(
                    || vec![T::zero(); len],
                    |mut buf, step| {
                        for (p, value) in run_step(&base, target, step)? {
                            buf[p] += value;
                        }
                        Ok::<Vec<T>, ExecutionError>(buf)
                    },
                )
                .try_reduce(
                    || vec![T::zero(); len],
                    |mut acc, buf| {
                        for (a, b) in acc.iter_mut().zip(buf) {
                            *a += b;
                        }
                        Ok(acc)
                    },
                )?;
            for (v, t) in vals.iter_mut().zip(total) {
                *v += t;
            }
            Ok(())
        }
    }));

    match outcome {
        Ok(result) => result.map_err(Into::into),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(ExecutionError::WorkerPanicked(message).into())
        }
    }
}
