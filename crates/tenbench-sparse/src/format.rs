//! Per-mode storage formats
//!
//! A tensor format is one [`ModeFormat`] per dimension plus the order in which
//! dimensions are stored. `Format::sparse(3)` is the all-compressed layout the
//! benchmark drivers use for every operand.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SparseResult, ValidationError};

/// Storage mode of a single tensor dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModeFormat {
    /// Every coordinate of the dimension is stored
    Dense,
    /// Only coordinates with entries are stored (compressed `pos`/`crd` level)
    Sparse,
}

impl fmt::Display for ModeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeFormat::Dense => write!(f, "Dense"),
            ModeFormat::Sparse => write!(f, "Sparse"),
        }
    }
}

/// Storage format of a whole tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Format {
    modes: Vec<ModeFormat>,
    mode_order: Vec<usize>,
}

impl Format {
    /// Format with the given per-dimension modes, stored in natural order
    pub fn new(modes: Vec<ModeFormat>) -> Self {
        let mode_order = (0..modes.len()).collect();
        Self { modes, mode_order }
    }

    /// All dimensions compressed
    pub fn sparse(rank: usize) -> Self {
        Self::new(vec![ModeFormat::Sparse; rank])
    }

    /// All dimensions dense
    pub fn dense(rank: usize) -> Self {
        Self::new(vec![ModeFormat::Dense; rank])
    }

    /// Replace the storage order
    ///
    /// `order[l]` is the dimension stored at level `l`.
    pub fn with_mode_order(mut self, order: Vec<usize>) -> SparseResult<Self> {
        validate_mode_order(&order, self.modes.len())?;
        self.mode_order = order;
        Ok(self)
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.modes.len()
    }

    /// Storage mode of each dimension, indexed by dimension
    pub fn modes(&self) -> &[ModeFormat] {
        &self.modes
    }

    /// Dimension stored at each level
    pub fn mode_order(&self) -> &[usize] {
        &self.mode_order
    }

    /// Storage mode of the given level
    pub fn level_mode(&self, level: usize) -> ModeFormat {
        self.modes[self.mode_order[level]]
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, mode) in self.modes.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", mode)?;
        }
        write!(f, ")")?;
        if self.mode_order.iter().enumerate().any(|(l, &m)| l != m) {
            write!(f, " order {:?}", self.mode_order)?;
        }
        Ok(())
    }
}

/// Check that `order` is a permutation of `0..rank`
pub fn validate_mode_order(order: &[usize], rank: usize) -> SparseResult<()> {
    let mut sorted = order.to_vec();
    sorted.sort_unstable();
    if sorted != (0..rank).collect::<Vec<_>>() {
        return Err(ValidationError::InvalidModeOrder {
            order: order.to_vec(),
            rank,
        }
        .into());
    }
    Ok(())
}
