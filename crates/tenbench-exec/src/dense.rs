//! Brute-force engine used as a correctness oracle
//!
//! Enumerates every point of the iteration space and probes each operand
//! with a point lookup. Schedules are validated but do not change the
//! iteration, so results never depend on them.

use std::borrow::Cow;

use tenbench_planner::{Assignment, LoopPlan, Schedule};
use tenbench_sparse::{Format, LevelStorage, Scalar, SparseTensor};

use crate::engine::{bind_operands, check_output, output_coord, TensorEngine};
use crate::error::{ExecResult, ExecutionError};

/// Iteration spaces above this size get a warning at compile time
const LARGE_ITERATION_SPACE: usize = 100_000_000;

/// Engine enumerating the full iteration space
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseEngine;

impl DenseEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Compiled assignment for [`DenseEngine`]
#[derive(Debug, Clone)]
pub struct DenseProgram<'a, T: Scalar> {
    plan: LoopPlan,
    operands: Vec<Cow<'a, SparseTensor<T>>>,
}

impl<'a, T: Scalar> DenseProgram<'a, T> {
    pub fn plan(&self) -> &LoopPlan {
        &self.plan
    }

    /// Call `f` with the bound coordinates and product of every point where
    /// all operands store an entry
    fn for_each_point<F>(&self, mut f: F)
    where
        F: FnMut(&[usize], T),
    {
        let extents = self.plan.extents();
        if extents.contains(&0) {
            return;
        }

        // Natural-order variable id of each operand dimension
        let modes: Vec<Vec<usize>> = self
            .plan
            .operands()
            .iter()
            .map(|op| {
                let mut vars = vec![0; op.level_order().len()];
                for (&mode, &var) in op.level_order().iter().zip(op.level_vars()) {
                    vars[mode] = var;
                }
                vars
            })
            .collect();
        let mut scratch: Vec<Vec<usize>> = modes.iter().map(|m| vec![0; m.len()]).collect();

        let mut point = vec![0; extents.len()];
        'points: loop {
            let mut product = T::one();
            for ((op, vars), coord) in self.operands.iter().zip(&modes).zip(&mut scratch) {
                for (slot, &var) in coord.iter_mut().zip(vars) {
                    *slot = point[var];
                }
                match op.get(coord) {
                    Some(v) => product = product * v,
                    None => {
                        if !advance(&mut point, extents) {
                            break 'points;
                        }
                        continue 'points;
                    }
                }
            }
            f(&point, product);

            if !advance(&mut point, extents) {
                break;
            }
        }
    }
}

/// Odometer step, last variable fastest; false once every point is visited
fn advance(point: &mut [usize], extents: &[usize]) -> bool {
    for d in (0..point.len()).rev() {
        point[d] += 1;
        if point[d] < extents[d] {
            return true;
        }
        point[d] = 0;
    }
    false
}

impl<T: Scalar> TensorEngine<T> for DenseEngine {
    type Program<'a> = DenseProgram<'a, T>
    where
        T: 'a;

    fn name(&self) -> &'static str {
        "dense"
    }

    fn compile<'a>(
        &self,
        assignment: &Assignment,
        operands: &[&'a SparseTensor<T>],
        schedule: &Schedule,
    ) -> ExecResult<Self::Program<'a>> {
        let (plan, operands) = bind_operands(assignment, operands, schedule, false)?;
        let points = plan
            .extents()
            .iter()
            .fold(1usize, |acc, &n| acc.saturating_mul(n));
        if points > LARGE_ITERATION_SPACE {
            log::warn!(
                "dense engine will visit {} points for {}; expect a long run",
                points,
                assignment
            );
        }
        Ok(DenseProgram { plan, operands })
    }

    fn assemble(&self, program: &Self::Program<'_>) -> ExecResult<SparseTensor<T>> {
        let plan = &program.plan;
        let rank = plan.output_vars().len();

        let mut coords = Vec::new();
        let mut out = vec![0; rank];
        program.for_each_point(|point, _| {
            output_coord(plan, point, &mut out);
            coords.push(out.clone());
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

        let (target, vals) = output
            .storage_mut()
            .map_err(ExecutionError::Storage)?
            .locator_mut();
        vals.iter_mut().for_each(|v| *v = T::zero());

        let mut out = vec![0; plan.output_vars().len()];
        let mut missing = None;
        program.for_each_point(|point, value| {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_visits_every_point() {
        let extents = [2, 3];
        let mut point = vec![0, 0];
        let mut seen = 1;
        while advance(&mut point, &extents) {
            seen += 1;
        }
        assert_eq!(seen, 6);
        assert_eq!(point, vec![0, 0]);
    }

    #[test]
    fn test_dense_matvec() {
        let mut a = SparseTensor::<i64>::new("A", vec![2, 3], Format::sparse(2)).unwrap();
        a.insert(vec![0, 2], 4).unwrap();
        a.insert(vec![1, 0], 5).unwrap();
        a.pack().unwrap();
        let mut x = SparseTensor::<i64>::new("x", vec![3], Format::sparse(1)).unwrap();
        x.insert(vec![2], 10).unwrap();
        x.pack().unwrap();

        let engine = DenseEngine::new();
        let stmt = Assignment::parse("y(i) = A(i,j) * x(j)").unwrap();
        let program = engine.compile(&stmt, &[&a, &x], &Schedule::new()).unwrap();
        let mut y = engine.assemble(&program).unwrap();
        engine.compute(&program, &mut y).unwrap();

        assert_eq!(y.get(&[0]), Some(40));
        assert_eq!(y.get(&[1]), None);
        assert_eq!(y.nnz(), 1);
    }
}
