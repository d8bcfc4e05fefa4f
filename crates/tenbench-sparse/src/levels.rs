//! Packed level storage for N-dimensional sparse tensors
//!
//! # Overview
//!
//! A packed tensor is a tree with one level per dimension, stored in the
//! format's mode order. Each level maps a parent position to a fiber of child
//! positions:
//!
//! - **Dense** level of extent `n`: parent `p` owns children `p*n .. p*n+n`,
//!   child `k` has coordinate `k`. Nothing is stored but `n`.
//! - **Compressed** level: parent `p` owns children `pos[p] .. pos[p+1]`,
//!   child `k` has coordinate `crd[k]`. Coordinates within a fiber are sorted.
//!
//! Values are stored at the leaf level, one per leaf position. The root is
//! the single position `0`, so a rank-0 tensor holds exactly one value.
//!
//! # Example
//!
//! Entries `(0,1)=5, (0,3)=6, (2,3)=7` of a `3x4` tensor with both levels
//! compressed:
//!
//! - level 0: `pos = [0, 2]`, `crd = [0, 2]`
//! - level 1: `pos = [0, 2, 3]`, `crd = [1, 3, 3]`
//! - `vals = [5, 6, 7]`
//!
//! # Complexity
//!
//! - **Construction from sorted entries**: O(nnz + Σ dense extents × fibers)
//! - **Point lookup**: O(levels × log(fiber length))
//! - **Full traversal**: O(stored positions)

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::format::{Format, ModeFormat};
use crate::scalar::Scalar;

/// One level of the storage tree
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Level {
    /// Every coordinate `0..size` is present under every parent
    Dense { size: usize },
    /// Only the listed coordinates are present
    Compressed { pos: Vec<usize>, crd: Vec<usize> },
}

impl Level {
    /// Storage mode of this level
    pub fn mode(&self) -> ModeFormat {
        match self {
            Level::Dense { .. } => ModeFormat::Dense,
            Level::Compressed { .. } => ModeFormat::Sparse,
        }
    }

    /// Children of parent position `parent`
    #[inline]
    pub fn fiber(&self, parent: usize) -> Fiber<'_> {
        match self {
            Level::Dense { size } => Fiber::Dense {
                base: parent * size,
                size: *size,
            },
            Level::Compressed { pos, crd } => {
                let start = pos[parent];
                let end = pos[parent + 1];
                Fiber::Compressed {
                    crd: &crd[start..end],
                    start,
                }
            }
        }
    }
}

/// Children of one parent position
#[derive(Debug, Clone, Copy)]
pub enum Fiber<'a> {
    Dense { base: usize, size: usize },
    Compressed { crd: &'a [usize], start: usize },
}

impl<'a> Fiber<'a> {
    /// Number of children
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Fiber::Dense { size, .. } => *size,
            Fiber::Compressed { crd, .. } => crd.len(),
        }
    }

    /// Whether the fiber has no children
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinate of the `k`-th child
    #[inline]
    pub fn coord(&self, k: usize) -> usize {
        match self {
            Fiber::Dense { .. } => k,
            Fiber::Compressed { crd, .. } => crd[k],
        }
    }

    /// Storage position of the `k`-th child
    #[inline]
    pub fn position(&self, k: usize) -> usize {
        match self {
            Fiber::Dense { base, .. } => base + k,
            Fiber::Compressed { start, .. } => start + k,
        }
    }

    /// Position of the child with coordinate `c`, if present
    pub fn find(&self, c: usize) -> Option<usize> {
        match self {
            Fiber::Dense { base, size } => (c < *size).then_some(base + c),
            Fiber::Compressed { crd, start } => crd.binary_search(&c).ok().map(|k| start + k),
        }
    }

    /// Child indices `k` whose coordinate lies in `lo..hi`
    pub fn span(&self, lo: usize, hi: usize) -> std::ops::Range<usize> {
        match self {
            Fiber::Dense { size, .. } => lo.min(*size)..hi.min(*size),
            Fiber::Compressed { crd, .. } => {
                let a = crd.partition_point(|&x| x < lo);
                let b = crd.partition_point(|&x| x < hi);
                a..b.max(a)
            }
        }
    }

    /// `(coordinate, position)` pairs in coordinate order
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + 'a {
        let fiber = *self;
        (0..fiber.len()).map(move |k| (fiber.coord(k), fiber.position(k)))
    }
}

/// Coordinate lookup over a level tree
#[derive(Debug, Clone, Copy)]
pub struct Locator<'a> {
    mode_order: &'a [usize],
    levels: &'a [Level],
}

impl<'a> Locator<'a> {
    /// Leaf position of a coordinate given in natural dimension order
    pub fn locate(&self, coord: &[usize]) -> Option<usize> {
        if coord.len() != self.levels.len() {
            return None;
        }
        let mut p = 0;
        for (level, &mode) in self.levels.iter().zip(self.mode_order) {
            p = level.fiber(p).find(coord[mode])?;
        }
        Some(p)
    }
}

/// Packed tree of levels plus leaf values
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LevelStorage<T> {
    shape: Vec<usize>,
    mode_order: Vec<usize>,
    levels: Vec<Level>,
    vals: Vec<T>,
}

impl<T: Scalar> LevelStorage<T> {
    /// Build storage from entries sorted by `format.mode_order()` with no
    /// duplicate coordinates
    ///
    /// Dense levels materialise every coordinate; leaf positions with no
    /// entry hold zero.
    pub fn from_sorted(shape: &[usize], format: &Format, entries: &[(Vec<usize>, T)]) -> Self {
        let rank = shape.len();
        let mode_order = format.mode_order().to_vec();
        let mut levels = Vec::with_capacity(rank);

        // Entry ranges owned by each position of the previous level
        let mut parents: Vec<(usize, usize)> = vec![(0, entries.len())];

        for level in 0..rank {
            let mode = mode_order[level];
            let mut children = Vec::new();

            match format.level_mode(level) {
                ModeFormat::Dense => {
                    let size = shape[mode];
                    children.reserve(parents.len() * size);
                    for &(start, end) in &parents {
                        let mut cursor = start;
                        for c in 0..size {
                            let run = cursor;
                            while cursor < end && entries[cursor].0[mode] == c {
                                cursor += 1;
                            }
                            children.push((run, cursor));
                        }
                    }
                    levels.push(Level::Dense { size });
                }
                ModeFormat::Sparse => {
                    let mut pos = Vec::with_capacity(parents.len() + 1);
                    let mut crd = Vec::new();
                    pos.push(0);
                    for &(start, end) in &parents {
                        let mut cursor = start;
                        while cursor < end {
                            let c = entries[cursor].0[mode];
                            let run = cursor;
                            while cursor < end && entries[cursor].0[mode] == c {
                                cursor += 1;
                            }
                            crd.push(c);
                            children.push((run, cursor));
                        }
                        pos.push(crd.len());
                    }
                    levels.push(Level::Compressed { pos, crd });
                }
            }

            parents = children;
        }

        let vals = parents
            .iter()
            .map(|&(start, end)| {
                if start < end {
                    entries[start].1
                } else {
                    T::zero()
                }
            })
            .collect();

        Self {
            shape: shape.to_vec(),
            mode_order,
            levels,
            vals,
        }
    }

    /// Shape of the stored tensor
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Dimension stored at each level
    pub fn mode_order(&self) -> &[usize] {
        &self.mode_order
    }

    /// The storage levels, outermost first
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    /// Leaf values
    pub fn vals(&self) -> &[T] {
        &self.vals
    }

    /// Mutable leaf values
    pub fn vals_mut(&mut self) -> &mut [T] {
        &mut self.vals
    }

    /// Leaf position of a coordinate given in natural dimension order
    pub fn locate(&self, coord: &[usize]) -> Option<usize> {
        self.locator().locate(coord)
    }

    /// Read-only view of the level tree
    pub fn locator(&self) -> Locator<'_> {
        Locator {
            mode_order: &self.mode_order,
            levels: &self.levels,
        }
    }

    /// Level tree view alongside mutable leaf values
    ///
    /// Lets engines locate output positions while writing values.
    pub fn locator_mut(&mut self) -> (Locator<'_>, &mut [T]) {
        (
            Locator {
                mode_order: &self.mode_order,
                levels: &self.levels,
            },
            &mut self.vals,
        )
    }

    /// All stored `(coordinate, value)` pairs in storage order
    ///
    /// Dense levels yield their zero padding too.
    pub fn to_entries(&self) -> Vec<(Vec<usize>, T)> {
        let mut out = Vec::with_capacity(self.vals.len());
        let mut coord = vec![0; self.shape.len()];
        self.walk(0, 0, &mut coord, &mut out);
        out
    }

    fn walk(
        &self,
        level: usize,
        parent: usize,
        coord: &mut Vec<usize>,
        out: &mut Vec<(Vec<usize>, T)>,
    ) {
        if level == self.levels.len() {
            out.push((coord.clone(), self.vals[parent]));
            return;
        }
        let mode = self.mode_order[level];
        for (c, p) in self.levels[level].fiber(parent).iter() {
            coord[mode] = c;
            self.walk(level + 1, p, coord, out);
        }
    }
}
