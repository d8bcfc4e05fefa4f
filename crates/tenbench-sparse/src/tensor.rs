//! Named sparse tensor with an insert-then-pack lifecycle
//!
//! Entries are buffered with [`SparseTensor::insert`] and compacted once by
//! [`SparseTensor::pack`]. After packing, the tensor is read-only: further
//! inserts fail with [`StateError::AlreadyPacked`].
//!
//! Every merged coordinate stays an entry, including explicit zeros left by
//! accumulation. Zero padding of dense levels is storage, not entries.
//!
//! # Examples
//!
//! ```
//! use tenbench_sparse::{Format, SparseTensor};
//!
//! let mut a = SparseTensor::<i64>::new("A", vec![100], Format::sparse(1)).unwrap();
//! a.insert(vec![3], 12).unwrap();
//! a.insert(vec![3], 12).unwrap();
//! a.insert(vec![7], 12).unwrap();
//! a.pack().unwrap();
//!
//! assert_eq!(a.nnz(), 2);
//! assert_eq!(a.get(&[3]), Some(24));
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::coo::{CooBuffer, DuplicatePolicy};
use crate::error::{SparseResult, StateError, ValidationError};
use crate::fixture::capacity;
use crate::format::Format;
use crate::levels::LevelStorage;
use crate::scalar::Scalar;

/// Sparse tensor fixture or kernel output
#[derive(Debug, Clone)]
pub struct SparseTensor<T> {
    name: String,
    shape: Vec<usize>,
    format: Format,
    policy: DuplicatePolicy,
    pending: CooBuffer<T>,
    packed: Option<LevelStorage<T>>,
    /// Leaf positions holding entries, ascending; `None` when every leaf does
    explicit: Option<Vec<usize>>,
    nnz: usize,
}

impl<T: Scalar> SparseTensor<T> {
    /// Create an empty, unpacked tensor
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The format rank differs from the shape rank
    /// - The shape contains a zero extent
    pub fn new(name: impl Into<String>, shape: Vec<usize>, format: Format) -> SparseResult<Self> {
        if format.rank() != shape.len() {
            return Err(ValidationError::FormatRankMismatch {
                formats: format.rank(),
                rank: shape.len(),
            }
            .into());
        }
        if shape.contains(&0) {
            return Err(ValidationError::ZeroInShape.into());
        }

        Ok(Self {
            name: name.into(),
            pending: CooBuffer::new(shape.clone()),
            shape,
            format,
            policy: DuplicatePolicy::default(),
            packed: None,
            explicit: None,
            nnz: 0,
        })
    }

    /// Create an empty rank-0 tensor
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: Vec::new(),
            format: Format::sparse(0),
            policy: DuplicatePolicy::default(),
            pending: CooBuffer::new(Vec::new()),
            packed: None,
            explicit: None,
            nnz: 0,
        }
    }

    /// Wrap already packed storage
    ///
    /// Used by engines when they assemble output tensors. Every leaf
    /// position counts as an entry, so `nnz` equals [`Self::stored_len`].
    pub fn from_storage(name: impl Into<String>, format: Format, storage: LevelStorage<T>) -> Self {
        let shape = storage.shape().to_vec();
        let nnz = storage.vals().len();
        Self {
            name: name.into(),
            pending: CooBuffer::new(shape.clone()),
            shape,
            format,
            policy: DuplicatePolicy::default(),
            packed: Some(storage),
            explicit: None,
            nnz,
        }
    }

    /// Set how duplicate coordinates are merged at pack time
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Tensor name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dimension sizes
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Storage format
    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Duplicate merge policy
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Whether `pack` has run
    pub fn is_packed(&self) -> bool {
        self.packed.is_some()
    }

    /// Number of buffered inserts awaiting `pack`
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffer an entry
    pub fn insert(&mut self, coord: Vec<usize>, value: T) -> SparseResult<()> {
        if self.is_packed() {
            return Err(StateError::AlreadyPacked(self.name.clone()).into());
        }
        self.pending.push(coord, value)
    }

    /// Reserve space for `additional` inserts
    pub fn reserve(&mut self, additional: usize) {
        self.pending.reserve(additional);
    }

    /// Compact buffered entries into level storage
    ///
    /// Runs once; a second call fails with [`StateError::AlreadyPacked`].
    pub fn pack(&mut self) -> SparseResult<()> {
        if self.is_packed() {
            return Err(StateError::AlreadyPacked(self.name.clone()).into());
        }

        let pending = std::mem::replace(&mut self.pending, CooBuffer::new(self.shape.clone()));
        let inserted = pending.len();
        let entries = pending.into_sorted(self.format.mode_order(), self.policy);

        log::debug!(
            "packing {}: {} inserts -> {} entries ({:?})",
            self.name,
            inserted,
            entries.len(),
            self.policy
        );

        let storage = LevelStorage::from_sorted(&self.shape, &self.format, &entries);
        if storage.vals().len() != entries.len() {
            self.explicit = Some(entries.iter().filter_map(|(c, _)| storage.locate(c)).collect());
        }
        self.nnz = entries.len();
        self.packed = Some(storage);
        Ok(())
    }

    /// Packed storage
    pub fn storage(&self) -> SparseResult<&LevelStorage<T>> {
        self.packed
            .as_ref()
            .ok_or_else(|| StateError::NotPacked(self.name.clone()).into())
    }

    /// Mutable packed storage
    pub fn storage_mut(&mut self) -> SparseResult<&mut LevelStorage<T>> {
        match self.packed.as_mut() {
            Some(storage) => Ok(storage),
            None => Err(StateError::NotPacked(self.name.clone()).into()),
        }
    }

    /// Mutable leaf values of packed storage
    pub fn vals_mut(&mut self) -> SparseResult<&mut [T]> {
        match self.packed.as_mut() {
            Some(storage) => Ok(storage.vals_mut()),
            None => Err(StateError::NotPacked(self.name.clone()).into()),
        }
    }

    /// Number of entries (0 before packing)
    ///
    /// After `pack` this is the number of distinct inserted coordinates,
    /// explicit zeros included and dense padding excluded.
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Number of stored leaf values, dense padding included
    pub fn stored_len(&self) -> usize {
        self.packed.as_ref().map_or(0, |s| s.vals().len())
    }

    /// Stored entries / total coordinates
    pub fn density(&self) -> f64 {
        self.nnz as f64 / capacity(&self.shape) as f64
    }

    /// Stored value at a coordinate, `None` when absent or unpacked
    pub fn get(&self, coord: &[usize]) -> Option<T> {
        let storage = self.packed.as_ref()?;
        storage.locate(coord).map(|p| storage.vals()[p])
    }

    /// Entries in storage order, without dense padding
    pub fn entries(&self) -> SparseResult<Vec<(Vec<usize>, T)>> {
        let stored = self.storage()?.to_entries();
        let Some(explicit) = &self.explicit else {
            return Ok(stored);
        };

        let mut keep = explicit.iter().copied().peekable();
        Ok(stored
            .into_iter()
            .enumerate()
            .filter_map(|(p, entry)| keep.next_if_eq(&p).map(|_| entry))
            .collect())
    }

    /// Non-zero entries keyed by coordinate in natural order
    ///
    /// Empty before packing.
    pub fn nonzeros(&self) -> BTreeMap<Vec<usize>, T> {
        self.packed
            .as_ref()
            .map(|s| {
                s.to_entries()
                    .into_iter()
                    .filter(|(_, v)| *v != T::zero())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Copy of this tensor stored with a different level order
    ///
    /// Carries over every entry, explicit zeros included.
    pub fn repack(&self, mode_order: &[usize]) -> SparseResult<Self> {
        let format = self.format.clone().with_mode_order(mode_order.to_vec())?;
        let mut copy = Self::new(self.name.clone(), self.shape.clone(), format)?
            .with_duplicate_policy(self.policy);

        let entries = self.entries()?;
        copy.reserve(entries.len());
        for (coord, value) in entries {
            copy.insert(coord, value)?;
        }
        copy.pack()?;

        log::debug!(
            "repacked {} from order {:?} to {:?}",
            self.name,
            self.format.mode_order(),
            mode_order
        );
        Ok(copy)
    }
}

impl<T: Scalar> fmt::Display for SparseTensor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {} nnz={}",
            self.name, self.shape, self.format, self.nnz
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SparseError;
    use crate::format::ModeFormat;

    #[test]
    fn test_insert_pack_get() {
        let mut t = SparseTensor::<i64>::new("A", vec![3, 4], Format::sparse(2)).unwrap();
        t.insert(vec![0, 1], 5).unwrap();
        t.insert(vec![2, 3], 7).unwrap();
        assert_eq!(t.pending_len(), 2);
        assert_eq!(t.nnz(), 0);

        t.pack().unwrap();
        assert!(t.is_packed());
        assert_eq!(t.nnz(), 2);
        assert_eq!(t.get(&[0, 1]), Some(5));
        assert_eq!(t.get(&[1, 1]), None);
    }

    #[test]
    fn test_insert_after_pack_fails() {
        let mut t = SparseTensor::<i64>::new("A", vec![3], Format::sparse(1)).unwrap();
        t.pack().unwrap();
        let err = t.insert(vec![0], 1).unwrap_err();
        assert!(matches!(
            err,
            SparseError::State(StateError::AlreadyPacked(_))
        ));
        assert!(t.pack().is_err());
    }

    #[test]
    fn test_storage_before_pack_fails() {
        let t = SparseTensor::<i64>::new("A", vec![3], Format::sparse(1)).unwrap();
        assert!(matches!(
            t.storage(),
            Err(SparseError::State(StateError::NotPacked(_)))
        ));
        assert!(t.nonzeros().is_empty());
    }

    #[test]
    fn test_new_rejects_bad_format() {
        assert!(SparseTensor::<i64>::new("A", vec![3, 3], Format::sparse(1)).is_err());
        assert!(SparseTensor::<i64>::new("A", vec![3, 0], Format::sparse(2)).is_err());
    }

    #[test]
    fn test_overwrite_policy() {
        let mut t = SparseTensor::<i64>::new("A", vec![4], Format::sparse(1))
            .unwrap()
            .with_duplicate_policy(DuplicatePolicy::Overwrite);
        t.insert(vec![2], 1).unwrap();
        t.insert(vec![2], 9).unwrap();
        t.pack().unwrap();
        assert_eq!(t.get(&[2]), Some(9));
        assert_eq!(t.nnz(), 1);
    }

    #[test]
    fn test_repack_preserves_entries() {
        let mut t = SparseTensor::<i64>::new("B", vec![3, 5], Format::sparse(2)).unwrap();
        for (i, j, v) in [(0, 4, 1), (2, 0, 2), (1, 1, 3), (2, 4, 4)] {
            t.insert(vec![i, j], v).unwrap();
        }
        t.pack().unwrap();

        let r = t.repack(&[1, 0]).unwrap();
        assert_eq!(r.format().mode_order(), &[1, 0]);
        assert_eq!(r.nonzeros(), t.nonzeros());
        let order: Vec<_> = r.entries().unwrap().into_iter().map(|(c, _)| c).collect();
        assert_eq!(order, vec![vec![2, 0], vec![1, 1], vec![0, 4], vec![2, 4]]);
    }

    #[test]
    fn test_explicit_zero_kept() {
        let mut t = SparseTensor::<i64>::new("A", vec![4], Format::sparse(1)).unwrap();
        t.insert(vec![2], 5).unwrap();
        t.insert(vec![2], -5).unwrap();
        t.pack().unwrap();

        assert_eq!(t.nnz(), 1);
        assert_eq!(t.get(&[2]), Some(0));
        assert_eq!(t.entries().unwrap(), vec![(vec![2], 0)]);
        assert!(t.nonzeros().is_empty());
    }

    #[test]
    fn test_repack_keeps_explicit_zero() {
        let mut t = SparseTensor::<i64>::new("A", vec![2, 3], Format::sparse(2)).unwrap();
        t.insert(vec![1, 2], 5).unwrap();
        t.insert(vec![1, 2], -5).unwrap();
        t.insert(vec![0, 0], 4).unwrap();
        t.pack().unwrap();

        let r = t.repack(&[1, 0]).unwrap();
        assert_eq!(r.nnz(), 2);
        assert_eq!(r.get(&[1, 2]), Some(0));
        assert_eq!(r.entries().unwrap(), vec![(vec![0, 0], 4), (vec![1, 2], 0)]);
    }

    #[test]
    fn test_entries_skip_dense_padding() {
        let format = Format::new(vec![ModeFormat::Dense, ModeFormat::Dense]);
        let mut t = SparseTensor::<i64>::new("M", vec![2, 2], format).unwrap();
        t.insert(vec![0, 1], 3).unwrap();
        t.insert(vec![1, 0], 2).unwrap();
        t.insert(vec![1, 0], -2).unwrap();
        t.pack().unwrap();

        assert_eq!(t.stored_len(), 4);
        assert_eq!(t.nnz(), 2);
        assert_eq!(t.entries().unwrap(), vec![(vec![0, 1], 3), (vec![1, 0], 0)]);

        let r = t.repack(&[1, 0]).unwrap();
        assert_eq!(r.entries().unwrap(), vec![(vec![1, 0], 0), (vec![0, 1], 3)]);
    }

    #[test]
    fn test_from_storage_counts_every_leaf() {
        let format = Format::sparse(1);
        let storage = LevelStorage::from_sorted(&[5], &format, &[(vec![1], 0i64), (vec![3], 0)]);
        let t = SparseTensor::from_storage("D", format, storage);
        assert_eq!(t.nnz(), 2);
        assert_eq!(t.nnz(), t.stored_len());
        assert_eq!(t.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_density() {
        let mut t = SparseTensor::<i64>::new("A", vec![4, 5], Format::sparse(2)).unwrap();
        t.insert(vec![0, 0], 1).unwrap();
        t.insert(vec![3, 4], 1).unwrap();
        t.pack().unwrap();
        assert_eq!(t.density(), 0.1);

        let huge = SparseTensor::<i64>::new("H", vec![usize::MAX, 4], Format::sparse(2)).unwrap();
        assert_eq!(huge.density(), 0.0);
    }

    #[test]
    fn test_dense_mode_nonzeros() {
        let format = Format::new(vec![ModeFormat::Dense, ModeFormat::Sparse]);
        let mut t = SparseTensor::<i64>::new("M", vec![2, 3], format).unwrap();
        t.insert(vec![1, 2], 6).unwrap();
        t.pack().unwrap();

        assert_eq!(t.nnz(), 1);
        assert_eq!(t.nonzeros().len(), 1);
        assert_eq!(t.to_string(), "M [2, 3] (Dense,Sparse) nnz=1");
    }

    #[test]
    fn test_scalar_tensor() {
        let mut s = SparseTensor::<i64>::scalar("S");
        s.insert(vec![], 3).unwrap();
        s.insert(vec![], 4).unwrap();
        s.pack().unwrap();
        assert_eq!(s.get(&[]), Some(7));
    }
}
