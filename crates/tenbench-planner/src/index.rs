//! Index notation: variables, accesses and assignments
//!
//! An [`Assignment`] writes the product of its right-hand side accesses into
//! the output access. Variables that appear only on the right-hand side are
//! summed out.
//!
//! ```
//! use tenbench_planner::{Access, Assignment, IndexVar};
//!
//! let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
//! let stmt = Assignment::new(
//!     Access::new("D", [i.clone()]),
//!     vec![
//!         Access::new("A", [i.clone(), j.clone()]),
//!         Access::new("B", [i.clone(), j.clone()]),
//!         Access::new("C", [j.clone()]),
//!     ],
//! )
//! .unwrap();
//!
//! assert_eq!(stmt.reduction_vars(), vec![j]);
//! assert_eq!(stmt.to_string(), "D(i) = A(i,j) * B(i,j) * C(j)");
//! ```

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Symbolic axis label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexVar(String);

impl IndexVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IndexVar {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A tensor bound to a tuple of index variables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Access {
    tensor: String,
    indices: Vec<IndexVar>,
}

impl Access {
    pub fn new(tensor: impl Into<String>, indices: impl IntoIterator<Item = IndexVar>) -> Self {
        Self {
            tensor: tensor.into(),
            indices: indices.into_iter().collect(),
        }
    }

    /// Name of the accessed tensor
    pub fn tensor(&self) -> &str {
        &self.tensor
    }

    /// Index variable of each tensor dimension
    pub fn indices(&self) -> &[IndexVar] {
        &self.indices
    }

    /// Dimension accessed with `var`, if any
    pub fn mode_of(&self, var: &IndexVar) -> Option<usize> {
        self.indices.iter().position(|v| v == var)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.tensor)?;
        for (k, var) in self.indices.iter().enumerate() {
            if k > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", var)?;
        }
        write!(f, ")")
    }
}

/// `lhs = rhs[0] * rhs[1] * ...`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Assignment {
    lhs: Access,
    rhs: Vec<Access>,
}

impl Assignment {
    /// Build an assignment
    ///
    /// # Errors
    ///
    /// - No right-hand side accesses
    /// - A variable repeated within one access
    /// - An output variable absent from the right-hand side
    /// - The output tensor read on the right-hand side
    pub fn new(lhs: Access, rhs: Vec<Access>) -> PlanResult<Self> {
        if rhs.is_empty() {
            return Err(PlanError::EmptyExpression);
        }

        for access in std::iter::once(&lhs).chain(&rhs) {
            for (k, var) in access.indices.iter().enumerate() {
                if access.indices[..k].contains(var) {
                    return Err(PlanError::RepeatedIndexVar {
                        tensor: access.tensor.clone(),
                        var: var.clone(),
                    });
                }
            }
        }

        if let Some(var) = lhs
            .indices
            .iter()
            .find(|v| !rhs.iter().any(|a| a.indices.contains(v)))
        {
            return Err(PlanError::UnboundOutputVar(var.clone()));
        }

        if rhs.iter().any(|a| a.tensor == lhs.tensor) {
            return Err(PlanError::OutputOnRhs(lhs.tensor.clone()));
        }

        Ok(Self { lhs, rhs })
    }

    /// Output access
    pub fn lhs(&self) -> &Access {
        &self.lhs
    }

    /// Right-hand side factors in evaluation order
    pub fn rhs(&self) -> &[Access] {
        &self.rhs
    }

    /// Name of the output tensor
    pub fn output(&self) -> &str {
        &self.lhs.tensor
    }

    /// Output variables in output order
    pub fn free_vars(&self) -> Vec<IndexVar> {
        self.lhs.indices.clone()
    }

    /// Summed-out variables in order of first appearance
    pub fn reduction_vars(&self) -> Vec<IndexVar> {
        let mut vars: Vec<IndexVar> = Vec::new();
        for var in self.rhs.iter().flat_map(|a| &a.indices) {
            if !self.lhs.indices.contains(var) && !vars.contains(var) {
                vars.push(var.clone());
            }
        }
        vars
    }

    /// Free variables followed by reduction variables
    pub fn vars(&self) -> Vec<IndexVar> {
        let mut vars = self.free_vars();
        vars.extend(self.reduction_vars());
        vars
    }

    /// Whether `var` is summed out
    pub fn is_reduction(&self, var: &IndexVar) -> bool {
        !self.lhs.indices.contains(var) && self.rhs.iter().any(|a| a.indices.contains(var))
    }

    /// Distinct tensor names read on the right-hand side, in order
    pub fn operand_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for access in &self.rhs {
            if !names.contains(&access.tensor.as_str()) {
                names.push(&access.tensor);
            }
        }
        names
    }

    /// Same assignment with the right-hand side factors permuted
    ///
    /// `order[k]` is the index of the factor placed at position `k`.
    pub fn permuted(&self, order: &[usize]) -> PlanResult<Self> {
        let mut seen = vec![false; self.rhs.len()];
        if order.len() != self.rhs.len()
            || order.iter().any(|&k| k >= seen.len() || std::mem::replace(&mut seen[k], true))
        {
            return Err(PlanError::InvalidPermutation {
                order: order.to_vec(),
                len: self.rhs.len(),
            });
        }
        let rhs = order.iter().map(|&k| self.rhs[k].clone()).collect();
        Self::new(self.lhs.clone(), rhs)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = ", self.lhs)?;
        for (k, access) in self.rhs.iter().enumerate() {
            if k > 0 {
                write!(f, " * ")?;
            }
            write!(f, "{}", access)?;
        }
        Ok(())
    }
}
