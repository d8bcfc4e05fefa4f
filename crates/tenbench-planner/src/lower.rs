//! Lowering of scheduled assignments to concrete loop nests
//!
//! [`lower`] checks an assignment against the shapes of its operands, applies
//! a [`Schedule`] to the default loop nest and produces a [`LoopPlan`]: the
//! loop order, the level order each operand must be stored in, and which
//! operand levels each loop co-iterates.
//!
//! # Default loop nest
//!
//! Output variables in output order, then summed-out variables in order of
//! first appearance on the right-hand side. No splits, no parallel loop.
//!
//! # Operand level order
//!
//! Every operand is traversed root to leaf, so its levels must be bound in
//! the order the loop nest binds their variables. An operand whose stored
//! mode order differs is *discordant* and is flagged for a repack.
//!
//! # Examples
//!
//! ```
//! use tenbench_planner::{lower, Assignment, Schedule, TensorInfo};
//!
//! let stmt = Assignment::parse("D(i) = A(i,j) * B(i,j) * C(j)").unwrap();
//! let operands = [
//!     TensorInfo::new("A", vec![100, 50], vec![0, 1]),
//!     TensorInfo::new("B", vec![100, 50], vec![0, 1]),
//!     TensorInfo::new("C", vec![50], vec![0]),
//! ];
//!
//! let plan = lower(&stmt, &operands, &Schedule::new().reorder(["j", "i"])).unwrap();
//! assert_eq!(plan.loop_names(), vec!["j", "i"]);
//! assert!(plan.operands()[0].needs_repack());
//! assert_eq!(plan.output_shape(), vec![100]);
//! ```

use std::fmt;

use tenbench_sparse::{Scalar, SparseTensor};

use crate::error::{PlanError, PlanResult};
use crate::index::{Assignment, IndexVar};
use crate::schedule::{OutputRaceStrategy, ParallelUnit, Schedule, Transform};

/// Shape and storage order of a bound operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    name: String,
    shape: Vec<usize>,
    mode_order: Vec<usize>,
}

impl TensorInfo {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, mode_order: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
            mode_order,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn mode_order(&self) -> &[usize] {
        &self.mode_order
    }
}

impl<T: Scalar> From<&SparseTensor<T>> for TensorInfo {
    fn from(tensor: &SparseTensor<T>) -> Self {
        Self::new(
            tensor.name(),
            tensor.shape().to_vec(),
            tensor.format().mode_order().to_vec(),
        )
    }
}

/// How a loop relates to the index variable it derives from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Iterates every coordinate of the variable
    Full,
    /// Iterates tiles `t` covering coordinates `t*factor .. (t+1)*factor`
    Outer { factor: usize },
    /// Iterates coordinates within the tile chosen by the matching outer loop
    Inner { factor: usize },
}

impl LoopKind {
    /// Whether the loop fixes a coordinate of its source variable
    pub fn binds(&self) -> bool {
        !matches!(self, LoopKind::Outer { .. })
    }
}

/// An operand level co-iterated by a loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Participant {
    /// Right-hand side position of the operand
    pub operand: usize,
    /// Level of the operand's storage tree
    pub level: usize,
}

/// One loop of the nest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    pub name: IndexVar,
    /// Id of the index variable the loop derives from
    pub source: usize,
    pub kind: LoopKind,
    pub participants: Vec<Participant>,
}

/// Storage requirements of one right-hand side access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandPlan {
    tensor: String,
    level_order: Vec<usize>,
    level_vars: Vec<usize>,
    needs_repack: bool,
}

impl OperandPlan {
    pub fn tensor(&self) -> &str {
        &self.tensor
    }

    /// Tensor dimension to store at each level
    pub fn level_order(&self) -> &[usize] {
        &self.level_order
    }

    /// Variable id bound at each level
    pub fn level_vars(&self) -> &[usize] {
        &self.level_vars
    }

    /// Whether the stored mode order differs from `level_order`
    pub fn needs_repack(&self) -> bool {
        self.needs_repack
    }
}

/// Parallel directive attached to the outermost loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelLoop {
    pub unit: ParallelUnit,
    pub strategy: OutputRaceStrategy,
}

/// Fully resolved loop nest for one assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopPlan {
    output: String,
    vars: Vec<IndexVar>,
    extents: Vec<usize>,
    reduction: Vec<bool>,
    loops: Vec<Loop>,
    operands: Vec<OperandPlan>,
    output_vars: Vec<usize>,
    parallel: Option<ParallelLoop>,
}

impl LoopPlan {
    /// Name of the output tensor
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Index variables by id
    pub fn vars(&self) -> &[IndexVar] {
        &self.vars
    }

    /// Extent of each index variable by id
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Whether variable `id` is summed out
    pub fn is_reduction(&self, id: usize) -> bool {
        self.reduction[id]
    }

    /// Loops, outermost first
    pub fn loops(&self) -> &[Loop] {
        &self.loops
    }

    pub fn loop_names(&self) -> Vec<&str> {
        self.loops.iter().map(|l| l.name.name()).collect()
    }

    /// One entry per right-hand side access, in expression order
    pub fn operands(&self) -> &[OperandPlan] {
        &self.operands
    }

    /// Variable id of each output dimension
    pub fn output_vars(&self) -> &[usize] {
        &self.output_vars
    }

    pub fn output_shape(&self) -> Vec<usize> {
        self.output_vars.iter().map(|&v| self.extents[v]).collect()
    }

    /// Directive for the outermost loop, if it runs in parallel
    pub fn parallel(&self) -> Option<ParallelLoop> {
        self.parallel
    }
}

impl fmt::Display for LoopPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, l) in self.loops.iter().enumerate() {
            let source = &self.vars[l.source];
            write!(f, "{:indent$}for {} in ", "", l.name, indent = depth * 2)?;
            match l.kind {
                LoopKind::Full => write!(f, "0..{}", self.extents[l.source])?,
                LoopKind::Outer { factor } => write!(f, "tiles({}, {})", source, factor)?,
                LoopKind::Inner { factor } => write!(f, "tile({}, {})", source, factor)?,
            }
            if !l.participants.is_empty() {
                let parts: Vec<String> = l
                    .participants
                    .iter()
                    .map(|p| format!("{}.{}", self.operands[p.operand].tensor, p.level))
                    .collect();
                write!(f, " [{}]", parts.join(" "))?;
            }
            if depth == 0 {
                if let Some(par) = self.parallel {
                    write!(f, " parallel({}, {})", par.unit, par.strategy)?;
                }
            }
            writeln!(f)?;
        }

        let out: Vec<&str> = self.output_vars.iter().map(|&v| self.vars[v].name()).collect();
        let factors: Vec<&str> = self.operands.iter().map(|o| o.tensor.as_str()).collect();
        write!(
            f,
            "{:indent$}{}({}) += {}",
            "",
            self.output,
            out.join(","),
            factors.join(" * "),
            indent = self.loops.len() * 2
        )
    }
}

/// Lower an assignment under a schedule
///
/// # Errors
///
/// - [`PlanError::UnknownTensor`] / [`PlanError::ArityMismatch`] when an
///   access does not match a bound operand
/// - [`PlanError::ShapeMismatch`] when one variable has two extents
/// - [`PlanError::UnknownIndexVar`] when the schedule names a missing loop
/// - [`PlanError::InvalidSchedule`] for a malformed transformation
pub fn lower(
    assignment: &Assignment,
    operands: &[TensorInfo],
    schedule: &Schedule,
) -> PlanResult<LoopPlan> {
    let vars = assignment.vars();
    let var_id = |var: &IndexVar| vars.iter().position(|v| v == var);
    let extents = resolve_extents(assignment, operands, &vars)?;
    let reduction: Vec<bool> = vars.iter().map(|v| assignment.is_reduction(v)).collect();

    let mut loops: Vec<Loop> = vars
        .iter()
        .enumerate()
        .map(|(id, v)| Loop {
            name: v.clone(),
            source: id,
            kind: LoopKind::Full,
            participants: Vec::new(),
        })
        .collect();

    let mut splits: Vec<(IndexVar, IndexVar)> = Vec::new();
    let mut parallel: Option<(IndexVar, ParallelLoop)> = None;

    for transform in schedule.transforms() {
        match transform {
            Transform::Split {
                var,
                outer,
                inner,
                factor,
            } => {
                if *factor == 0 {
                    return Err(PlanError::schedule(format!(
                        "split factor of '{}' must be at least 1",
                        var
                    )));
                }
                let at = find_loop(&loops, var)?;
                if loops[at].kind != LoopKind::Full {
                    return Err(PlanError::schedule(format!(
                        "loop '{}' is already derived from a split",
                        var
                    )));
                }
                if outer == inner {
                    return Err(PlanError::schedule(format!(
                        "split of '{}' needs two distinct loop names",
                        var
                    )));
                }
                for name in [outer, inner] {
                    if loops.iter().any(|l| &l.name == name) || var_id(name).is_some() {
                        return Err(PlanError::schedule(format!(
                            "loop name '{}' is already in use",
                            name
                        )));
                    }
                }

                let source = loops[at].source;
                let factor = *factor;
                loops.splice(
                    at..=at,
                    [
                        Loop {
                            name: outer.clone(),
                            source,
                            kind: LoopKind::Outer { factor },
                            participants: Vec::new(),
                        },
                        Loop {
                            name: inner.clone(),
                            source,
                            kind: LoopKind::Inner { factor },
                            participants: Vec::new(),
                        },
                    ],
                );
                splits.push((outer.clone(), inner.clone()));
            }
            Transform::Reorder(names) => {
                let mut slots = Vec::with_capacity(names.len());
                for (k, name) in names.iter().enumerate() {
                    if names[..k].contains(name) {
                        return Err(PlanError::schedule(format!(
                            "reorder lists '{}' twice",
                            name
                        )));
                    }
                    slots.push(find_loop(&loops, name)?);
                }
                let moved: Vec<Loop> = slots.iter().map(|&s| loops[s].clone()).collect();
                slots.sort_unstable();
                for (slot, l) in slots.into_iter().zip(moved) {
                    loops[slot] = l;
                }
            }
            Transform::Parallelize {
                var,
                unit,
                strategy,
            } => {
                find_loop(&loops, var)?;
                if parallel.is_some() {
                    return Err(PlanError::schedule(
                        "only one loop can be parallelized".to_string(),
                    ));
                }
                parallel = Some((
                    var.clone(),
                    ParallelLoop {
                        unit: *unit,
                        strategy: *strategy,
                    },
                ));
            }
        }
    }

    for (outer, inner) in &splits {
        // Split loops are only ever reordered, never removed
        let o = find_loop(&loops, outer)?;
        let i = find_loop(&loops, inner)?;
        if i < o {
            return Err(PlanError::schedule(format!(
                "inner loop '{}' is ordered before its outer loop '{}'",
                inner, outer
            )));
        }
    }

    let parallel = match parallel {
        Some((var, directive)) => {
            let at = find_loop(&loops, &var)?;
            if at != 0 {
                return Err(PlanError::schedule(format!(
                    "parallel loop '{}' must be the outermost loop",
                    var
                )));
            }
            if directive.strategy == OutputRaceStrategy::NoRaces && reduction[loops[at].source] {
                return Err(PlanError::schedule(format!(
                    "loop '{}' sums into shared outputs; NoRaces is not valid for it",
                    var
                )));
            }
            Some(directive)
        }
        None => None,
    };

    // Depth at which each variable receives its coordinate
    let mut bind_depth = vec![usize::MAX; vars.len()];
    for (depth, l) in loops.iter().enumerate() {
        if l.kind.binds() {
            bind_depth[l.source] = depth;
        }
    }

    let mut plans = Vec::with_capacity(assignment.rhs().len());
    for access in assignment.rhs() {
        let info = operand_info(operands, access.tensor())?;
        let mut level_order: Vec<usize> = (0..access.indices().len()).collect();
        level_order.sort_by_key(|&mode| {
            var_id(&access.indices()[mode]).map_or(usize::MAX, |id| bind_depth[id])
        });
        let level_vars = level_order
            .iter()
            .map(|&mode| var_id(&access.indices()[mode]).unwrap_or(usize::MAX))
            .collect();
        plans.push(OperandPlan {
            tensor: access.tensor().to_string(),
            needs_repack: level_order != info.mode_order(),
            level_order,
            level_vars,
        });
    }

    for (depth, l) in loops.iter_mut().enumerate() {
        for (operand, plan) in plans.iter().enumerate() {
            let Some(level) = plan.level_vars.iter().position(|&v| v == l.source) else {
                continue;
            };
            let ready = plan.level_vars[..level]
                .iter()
                .all(|&v| bind_depth[v] < depth);
            if ready {
                l.participants.push(Participant { operand, level });
            }
        }
    }

    let output_vars = assignment
        .lhs()
        .indices()
        .iter()
        .filter_map(|v| var_id(v))
        .collect();

    let plan = LoopPlan {
        output: assignment.output().to_string(),
        vars,
        extents,
        reduction,
        loops,
        operands: plans,
        output_vars,
        parallel,
    };
    log::debug!("lowered {} under [{}]:\n{}", assignment, schedule, plan);
    Ok(plan)
}

fn operand_info<'a>(operands: &'a [TensorInfo], name: &str) -> PlanResult<&'a TensorInfo> {
    operands
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| PlanError::UnknownTensor(name.to_string()))
}

fn find_loop(loops: &[Loop], name: &IndexVar) -> PlanResult<usize> {
    loops
        .iter()
        .position(|l| &l.name == name)
        .ok_or_else(|| PlanError::UnknownIndexVar(name.clone()))
}

/// Extent of each variable, checked across every access
fn resolve_extents(
    assignment: &Assignment,
    operands: &[TensorInfo],
    vars: &[IndexVar],
) -> PlanResult<Vec<usize>> {
    let mut extents: Vec<Option<usize>> = vec![None; vars.len()];

    for access in assignment.rhs() {
        let info = operand_info(operands, access.tensor())?;
        if info.shape.len() != access.indices().len() {
            return Err(PlanError::ArityMismatch {
                tensor: info.name.clone(),
                rank: info.shape.len(),
                got: access.indices().len(),
            });
        }

        for (mode, var) in access.indices().iter().enumerate() {
            let Some(id) = vars.iter().position(|v| v == var) else {
                continue;
            };
            let got = info.shape[mode];
            match extents[id] {
                None => extents[id] = Some(got),
                Some(expected) if expected != got => {
                    return Err(PlanError::ShapeMismatch {
                        var: var.clone(),
                        tensor: info.name.clone(),
                        expected,
                        got,
                    });
                }
                Some(_) => {}
            }
        }
    }

    // Every variable occurs on the right-hand side, so every extent is known
    Ok(extents.into_iter().map(|e| e.unwrap_or(0)).collect())
}
