//! Randomised fixture construction
//!
//! A fixture is a packed [`SparseTensor`] whose entries sit at uniformly
//! random coordinates drawn from a seeded generator, all holding the same
//! value. Random coordinates can collide; collisions are merged by the
//! tensor's [`DuplicatePolicy`], so the packed entry count can be lower than
//! the number of inserts.
//!
//! # Examples
//!
//! ```
//! use tenbench_sparse::{FixtureBuilder, ModeFormat};
//!
//! let a = FixtureBuilder::<i64>::new("A", vec![1000, 1000])
//!     .modes(vec![ModeFormat::Sparse, ModeFormat::Sparse])
//!     .entries(500)
//!     .seed(7)
//!     .build()
//!     .unwrap();
//!
//! assert!(a.nnz() <= 500);
//! assert!(a.is_packed());
//! ```

use scirs2_core::random::{rngs::StdRng, Rng, SeedableRng};

use crate::coo::DuplicatePolicy;
use crate::error::{SparseResult, ValidationError};
use crate::format::{Format, ModeFormat};
use crate::scalar::Scalar;
use crate::tensor::SparseTensor;

/// Value written at every fixture coordinate unless overridden
pub const DEFAULT_FIXTURE_VALUE: i64 = 12;

/// Seed used when none is given
pub const DEFAULT_SEED: u64 = 0x7e_4b_e4c4;

#[derive(Debug, Clone, PartialEq)]
enum Count {
    Entries(usize),
    Density(f64),
}

/// Builder for randomly populated, packed sparse tensors
#[derive(Debug, Clone)]
pub struct FixtureBuilder<T> {
    name: String,
    shape: Vec<usize>,
    modes: Option<Vec<ModeFormat>>,
    count: Count,
    fixed: Vec<Vec<usize>>,
    value: T,
    seed: u64,
    policy: DuplicatePolicy,
}

impl<T: Scalar> FixtureBuilder<T> {
    /// Start a fixture named `name` with the given shape
    ///
    /// Defaults: all modes sparse, no random entries, value 12, fixed seed,
    /// duplicates accumulate.
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
            modes: None,
            count: Count::Entries(0),
            fixed: Vec::new(),
            value: T::from_i64(DEFAULT_FIXTURE_VALUE),
            seed: DEFAULT_SEED,
            policy: DuplicatePolicy::default(),
        }
    }

    /// Per-dimension storage modes
    pub fn modes(mut self, modes: Vec<ModeFormat>) -> Self {
        self.modes = Some(modes);
        self
    }

    /// Number of random inserts
    pub fn entries(mut self, n: usize) -> Self {
        self.count = Count::Entries(n);
        self
    }

    /// Number of random inserts as a fraction of all coordinates
    pub fn density(mut self, density: f64) -> Self {
        self.count = Count::Density(density);
        self
    }

    /// Insert at a fixed coordinate in addition to the random ones
    pub fn at(mut self, coord: Vec<usize>) -> Self {
        self.fixed.push(coord);
        self
    }

    /// Value written at every inserted coordinate
    pub fn value(mut self, value: T) -> Self {
        self.value = value;
        self
    }

    /// Random generator seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Merge policy for colliding coordinates
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of random inserts this builder will perform
    pub fn insert_count(&self) -> SparseResult<usize> {
        match self.count {
            Count::Entries(n) => Ok(n),
            Count::Density(d) => {
                if !(0.0..=1.0).contains(&d) {
                    return Err(ValidationError::InvalidDensity(d).into());
                }
                Ok((d * capacity(&self.shape) as f64).round() as usize)
            }
        }
    }

    /// Insert all entries and pack
    pub fn build(self) -> SparseResult<SparseTensor<T>> {
        if self.shape.is_empty() {
            return Err(ValidationError::EmptyShape.into());
        }

        let format = match &self.modes {
            Some(modes) => Format::new(modes.clone()),
            None => Format::sparse(self.shape.len()),
        };
        let n = self.insert_count()?;

        let total = capacity(&self.shape);
        if n > total {
            log::warn!(
                "fixture {}: {} inserts requested for {} coordinates; duplicates are certain",
                self.name,
                n,
                total
            );
        }

        let mut tensor = SparseTensor::new(self.name.clone(), self.shape.clone(), format)?
            .with_duplicate_policy(self.policy);
        tensor.reserve(n + self.fixed.len());

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..n {
            let coord: Vec<usize> = self
                .shape
                .iter()
                .map(|&extent| rng.random_range(0..extent))
                .collect();
            tensor.insert(coord, self.value)?;
        }
        for coord in self.fixed {
            tensor.insert(coord, self.value)?;
        }

        tensor.pack()?;
        Ok(tensor)
    }
}

/// Build a packed fixture with `num_entries` random inserts
///
/// Shorthand for the common builder chain.
pub fn build_fixture<T: Scalar>(
    name: &str,
    shape: &[usize],
    modes: &[ModeFormat],
    num_entries: usize,
    seed: u64,
) -> SparseResult<SparseTensor<T>> {
    FixtureBuilder::new(name, shape.to_vec())
        .modes(modes.to_vec())
        .entries(num_entries)
        .seed(seed)
        .build()
}

/// Number of coordinates in a shape, saturating on overflow
pub fn capacity(shape: &[usize]) -> usize {
    shape.iter().fold(1usize, |acc, &n| acc.saturating_mul(n))
}
