//! COO insertion buffer
//!
//! Entries inserted into a tensor before `pack` are buffered here as
//! (coordinate, value) pairs. The buffer accepts duplicate coordinates; they
//! are merged according to a [`DuplicatePolicy`] when the buffer is sorted
//! for packing.
//!
//! # Examples
//!
//! ```
//! use tenbench_sparse::coo::{CooBuffer, DuplicatePolicy};
//!
//! let mut coo = CooBuffer::new(vec![3, 4]);
//! coo.push(vec![0, 1], 2).unwrap();
//! coo.push(vec![0, 1], 3).unwrap();
//! coo.push(vec![2, 0], 1).unwrap();
//!
//! let merged = coo.into_sorted(&[0, 1], DuplicatePolicy::Accumulate);
//! assert_eq!(merged, vec![(vec![0, 1], 5), (vec![2, 0], 1)]);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SparseError, SparseResult};
use crate::scalar::Scalar;

/// How entries inserted at the same coordinate are merged during pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DuplicatePolicy {
    /// Values at equal coordinates are summed
    #[default]
    Accumulate,
    /// The value inserted last wins
    Overwrite,
}

/// Unsorted (coordinate, value) buffer
#[derive(Debug, Clone)]
pub struct CooBuffer<T> {
    shape: Vec<usize>,
    indices: Vec<Vec<usize>>,
    values: Vec<T>,
}

impl<T: Scalar> CooBuffer<T> {
    /// Create an empty buffer for a tensor of the given shape
    pub fn new(shape: Vec<usize>) -> Self {
        Self {
            shape,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Reserve space for `additional` entries
    pub fn reserve(&mut self, additional: usize) {
        self.indices.reserve(additional);
        self.values.reserve(additional);
    }

    /// Number of buffered entries, duplicates included
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been buffered
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Shape the coordinates are checked against
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Buffer one entry
    ///
    /// Does not check for duplicates; see [`CooBuffer::into_sorted`].
    pub fn push(&mut self, index: Vec<usize>, value: T) -> SparseResult<()> {
        if index.len() != self.shape.len() {
            return Err(SparseError::dimension_mismatch(
                self.shape.len(),
                index.len(),
            ));
        }
        if index.iter().zip(&self.shape).any(|(&c, &n)| c >= n) {
            return Err(SparseError::index_out_of_bounds(index, self.shape.clone()));
        }

        self.indices.push(index);
        self.values.push(value);
        Ok(())
    }

    /// Drain the buffer into entries sorted lexicographically by `mode_order`
    /// with duplicates merged according to `policy`
    ///
    /// The sort is stable, so for `Overwrite` the surviving value is the one
    /// inserted last.
    pub fn into_sorted(
        self,
        mode_order: &[usize],
        policy: DuplicatePolicy,
    ) -> Vec<(Vec<usize>, T)> {
        let mut entries: Vec<(Vec<usize>, T)> =
            self.indices.into_iter().zip(self.values).collect();

        entries.sort_by(|a, b| {
            for &mode in mode_order {
                match a.0[mode].cmp(&b.0[mode]) {
                    std::cmp::Ordering::Equal => continue,
                    other => return other,
                }
            }
            std::cmp::Ordering::Equal
        });

        dedup_sorted(entries, policy)
    }
}

/// Merge runs of equal coordinates in an already sorted entry list
pub(crate) fn dedup_sorted<T: Scalar>(
    entries: Vec<(Vec<usize>, T)>,
    policy: DuplicatePolicy,
) -> Vec<(Vec<usize>, T)> {
    let mut merged: Vec<(Vec<usize>, T)> = Vec::with_capacity(entries.len());
    for (index, value) in entries {
        match merged.last_mut() {
            Some(last) if last.0 == index => match policy {
                DuplicatePolicy::Accumulate => last.1 += value,
                DuplicatePolicy::Overwrite => last.1 = value,
            },
            _ => merged.push((index, value)),
        }
    }
    merged
}
