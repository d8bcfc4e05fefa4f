//! Engine capability trait
//!
//! An engine turns an assignment over bound operands into a program, then
//! runs the program in two phases: `assemble` builds the output coordinate
//! pattern, `compute` fills in its values. Fixtures are shared by every
//! engine; only the engine decides how to iterate them.

use std::borrow::Cow;

use tenbench_planner::{lower, Assignment, LoopPlan, PlanError, Schedule, TensorInfo};
use tenbench_sparse::{Scalar, SparseTensor};

use crate::error::{ConfigurationError, ExecResult, ExecutionError};

/// Backend able to compile, assemble and compute tensor assignments
pub trait TensorEngine<T: Scalar> {
    /// Compiled form of one assignment, borrowing its operands
    type Program<'a>
    where
        T: 'a;

    /// Short engine name used in reports
    fn name(&self) -> &'static str;

    /// Validate the assignment and schedule against the operands
    fn compile<'a>(
        &self,
        assignment: &Assignment,
        operands: &[&'a SparseTensor<T>],
        schedule: &Schedule,
    ) -> ExecResult<Self::Program<'a>>;

    /// Allocate packed output storage holding every coordinate the program
    /// can write, with zero values
    fn assemble(&self, program: &Self::Program<'_>) -> ExecResult<SparseTensor<T>>;

    /// Overwrite the values of an assembled output
    fn compute(&self, program: &Self::Program<'_>, output: &mut SparseTensor<T>) -> ExecResult<()>;
}

/// Lower an assignment and bind one stored operand per right-hand side access
///
/// Operands stored in an order discordant with the loop nest are repacked
/// when `repack` is set.
pub(crate) fn bind_operands<'a, T: Scalar>(
    assignment: &Assignment,
    operands: &[&'a SparseTensor<T>],
    schedule: &Schedule,
    repack: bool,
) -> ExecResult<(LoopPlan, Vec<Cow<'a, SparseTensor<T>>>)> {
    for (k, op) in operands.iter().enumerate() {
        if operands[..k].iter().any(|o| o.name() == op.name()) {
            return Err(ConfigurationError::DuplicateOperand(op.name().to_string()).into());
        }
        op.storage().map_err(|source| ConfigurationError::Operand {
            name: op.name().to_string(),
            source,
        })?;
    }

    let infos: Vec<TensorInfo> = operands.iter().map(|&op| TensorInfo::from(op)).collect();
    let plan = lower(assignment, &infos, schedule)?;

    let mut bound = Vec::with_capacity(plan.operands().len());
    for op_plan in plan.operands() {
        let tensor = operands
            .iter()
            .copied()
            .find(|o| o.name() == op_plan.tensor())
            .ok_or_else(|| PlanError::UnknownTensor(op_plan.tensor().to_string()))?;
        if repack && op_plan.needs_repack() {
            let copy = tensor
                .repack(op_plan.level_order())
                .map_err(|source| ConfigurationError::Operand {
                    name: tensor.name().to_string(),
                    source,
                })?;
            bound.push(Cow::Owned(copy));
        } else {
            bound.push(Cow::Borrowed(tensor));
        }
    }

    Ok((plan, bound))
}

/// Check that `output` is the tensor a program was compiled for
pub(crate) fn check_output<T: Scalar>(plan: &LoopPlan, output: &SparseTensor<T>) -> ExecResult<()> {
    if output.name() != plan.output() || output.shape() != plan.output_shape().as_slice() {
        return Err(ExecutionError::OutputMismatch {
            expected: format!("{} {:?}", plan.output(), plan.output_shape()),
            got: format!("{} {:?}", output.name(), output.shape()),
        }
        .into());
    }
    Ok(())
}

/// Output coordinate of the current iteration point
#[inline]
pub(crate) fn output_coord(plan: &LoopPlan, coords: &[usize], out: &mut [usize]) {
    for (slot, &var) in out.iter_mut().zip(plan.output_vars()) {
        *slot = coords[var];
    }
}
