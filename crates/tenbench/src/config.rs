//! Experiment and harness configuration
//!
//! An [`ExperimentConfig`] describes one experiment: the fixtures it builds,
//! the kernels it times over those fixtures, and how often. A
//! [`HarnessConfig`] holds the process-wide knobs read from the
//! environment.
//!
//! ```
//! use tenbench::{ExperimentConfig, FixtureSpec};
//!
//! let config = ExperimentConfig::new("1")
//!     .fixture(FixtureSpec::new("A", vec![100]).entries(10).seed(1))
//!     .fixture(FixtureSpec::new("C", vec![100]).at(vec![0]))
//!     .kernel("D(i) = A(i) * C(i)")
//!     .repetitions(3);
//!
//! assert_eq!(config.kernels.len(), 1);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tenbench_planner::Schedule;
use tenbench_sparse::{FixtureBuilder, ModeFormat, SparseTensor, DEFAULT_SEED};

use crate::error::{HarnessError, HarnessResult};

/// Problem-size divisor applied when `TENBENCH_SCALE` is unset
pub const DEFAULT_SCALE: usize = 100;

/// Engine selected for an experiment run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EngineKind {
    /// Sparse co-iteration honouring the schedule
    #[default]
    Reference,
    /// Brute-force enumeration of the iteration space
    Dense,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Reference => write!(f, "reference"),
            EngineKind::Dense => write!(f, "dense"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> HarnessResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "reference" | "ref" => Ok(EngineKind::Reference),
            "dense" | "oracle" => Ok(EngineKind::Dense),
            _ => Err(HarnessError::setting("engine", s, "'reference' or 'dense'")),
        }
    }
}

/// How a fixture is populated
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Population {
    /// This many inserts at random coordinates
    Entries(usize),
    /// Fraction of the dense capacity, inserted at random coordinates
    Density(f64),
    /// Exactly these coordinates
    At(Vec<Vec<usize>>),
}

/// Declarative description of one fixture
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FixtureSpec {
    pub name: String,
    pub shape: Vec<usize>,
    /// Per-mode formats; every mode compressed when absent
    pub modes: Option<Vec<ModeFormat>>,
    pub population: Population,
    pub seed: u64,
}

impl FixtureSpec {
    pub fn new(name: impl Into<String>, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            shape,
            modes: None,
            population: Population::Entries(0),
            seed: DEFAULT_SEED,
        }
    }

    pub fn modes(mut self, modes: Vec<ModeFormat>) -> Self {
        self.modes = Some(modes);
        self
    }

    pub fn entries(mut self, n: usize) -> Self {
        self.population = Population::Entries(n);
        self
    }

    pub fn density(mut self, density: f64) -> Self {
        self.population = Population::Density(density);
        self
    }

    /// Add a fixed coordinate; replaces any random population
    pub fn at(mut self, coord: Vec<usize>) -> Self {
        match &mut self.population {
            Population::At(coords) => coords.push(coord),
            other => *other = Population::At(vec![coord]),
        }
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Build and pack the fixture
    pub fn build(&self) -> HarnessResult<SparseTensor<i64>> {
        let mut builder = FixtureBuilder::<i64>::new(self.name.clone(), self.shape.clone()).seed(self.seed);
        if let Some(modes) = &self.modes {
            builder = builder.modes(modes.clone());
        }
        builder = match &self.population {
            Population::Entries(n) => builder.entries(*n),
            Population::Density(d) => builder.density(*d),
            Population::At(coords) => coords.iter().cloned().fold(builder, |b, c| b.at(c)),
        };
        builder.build().map_err(|source| HarnessError::Fixture {
            name: self.name.clone(),
            source,
        })
    }
}

/// One timed kernel: a textual assignment and an optional schedule
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KernelSpec {
    pub statement: String,
    pub schedule: Option<Schedule>,
}

/// One experiment: fixtures, kernels over them, and repetition counts
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperimentConfig {
    /// Label printed as `Experiment # {label}`
    pub label: String,
    pub fixtures: Vec<FixtureSpec>,
    pub kernels: Vec<KernelSpec>,
    /// Timed repetitions per kernel
    pub repetitions: usize,
    /// Untimed repetitions run first and discarded
    pub warmup: usize,
}

impl ExperimentConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn fixture(mut self, spec: FixtureSpec) -> Self {
        self.fixtures.push(spec);
        self
    }

    /// Add a kernel using the default loop nest
    pub fn kernel(mut self, statement: impl Into<String>) -> Self {
        self.kernels.push(KernelSpec {
            statement: statement.into(),
            schedule: None,
        });
        self
    }

    /// Add a kernel compiled under `schedule`
    pub fn scheduled(mut self, statement: impl Into<String>, schedule: Schedule) -> Self {
        self.kernels.push(KernelSpec {
            statement: statement.into(),
            schedule: Some(schedule),
        });
        self
    }

    pub fn repetitions(mut self, n: usize) -> Self {
        self.repetitions = n;
        self
    }

    pub fn warmup(mut self, n: usize) -> Self {
        self.warmup = n;
        self
    }

    /// Check counts and name uniqueness before anything is built
    pub fn validate(&self) -> HarnessResult<()> {
        if self.kernels.is_empty() {
            return Err(HarnessError::NoKernels(self.label.clone()));
        }
        if self.repetitions == 0 {
            return Err(HarnessError::setting("repetitions", "0", "a positive integer"));
        }
        for (k, spec) in self.fixtures.iter().enumerate() {
            if self.fixtures[..k].iter().any(|f| f.name == spec.name) {
                return Err(HarnessError::setting(
                    "fixture name",
                    &spec.name,
                    "names unique within an experiment",
                ));
            }
        }
        Ok(())
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            label: "experiment".to_string(),
            fixtures: Vec::new(),
            kernels: Vec::new(),
            repetitions: 1,
            warmup: 0,
        }
    }
}

/// Process-wide harness settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HarnessConfig {
    /// Divisor applied to the original problem sizes
    pub scale: usize,
    pub repetitions: usize,
    pub warmup: usize,
    pub engine: EngineKind,
    /// Emit CSV rows after the text report
    pub csv: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            repetitions: 1,
            warmup: 0,
            engine: EngineKind::Reference,
            csv: false,
        }
    }
}

impl HarnessConfig {
    /// Read `TENBENCH_*` overrides from the process environment
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("TENBENCH_SCALE") {
            config.scale = positive("TENBENCH_SCALE", &v)?;
        }
        if let Some(v) = lookup("TENBENCH_REPS") {
            config.repetitions = positive("TENBENCH_REPS", &v)?;
        }
        if let Some(v) = lookup("TENBENCH_WARMUP") {
            config.warmup = v
                .trim()
                .parse()
                .map_err(|_| HarnessError::setting("TENBENCH_WARMUP", &v, "a non-negative integer"))?;
        }
        if let Some(v) = lookup("TENBENCH_ENGINE") {
            config.engine = v.parse().map_err(|_| {
                HarnessError::setting("TENBENCH_ENGINE", &v, "'reference' or 'dense'")
            })?;
        }
        if let Some(v) = lookup("TENBENCH_CSV") {
            config.csv = match v.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "" | "0" | "false" | "no" | "off" => false,
                _ => return Err(HarnessError::setting("TENBENCH_CSV", &v, "a boolean")),
            };
        }

        Ok(config)
    }

    /// Scale an original problem size down, never below `floor`
    pub fn scaled(&self, original: usize, floor: usize) -> usize {
        (original / self.scale.max(1)).max(floor)
    }
}

fn positive(setting: &str, value: &str) -> HarnessResult<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(HarnessError::setting(setting, value, "a positive integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_harness_defaults() {
        let config = HarnessConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.scale, DEFAULT_SCALE);
        assert_eq!(config.engine, EngineKind::Reference);
    }

    #[test]
    fn test_harness_overrides() {
        let config = HarnessConfig::from_lookup(lookup(&[
            ("TENBENCH_SCALE", "1000"),
            ("TENBENCH_REPS", "7"),
            ("TENBENCH_WARMUP", "2"),
            ("TENBENCH_ENGINE", "dense"),
            ("TENBENCH_CSV", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.scale, 1000);
        assert_eq!(config.repetitions, 7);
        assert_eq!(config.warmup, 2);
        assert_eq!(config.engine, EngineKind::Dense);
        assert!(config.csv);
    }

    #[test]
    fn test_harness_rejects_bad_values() {
        for (key, value) in [
            ("TENBENCH_SCALE", "0"),
            ("TENBENCH_REPS", "many"),
            ("TENBENCH_WARMUP", "-1"),
            ("TENBENCH_ENGINE", "gpu"),
            ("TENBENCH_CSV", "maybe"),
        ] {
            let err = HarnessConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn test_scaled_sizes() {
        let config = HarnessConfig::default();
        assert_eq!(config.scaled(100_000_000, 1), 1_000_000);
        assert_eq!(config.scaled(50, 8), 8);
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("Reference".parse::<EngineKind>().unwrap(), EngineKind::Reference);
        assert_eq!("oracle".parse::<EngineKind>().unwrap(), EngineKind::Dense);
        assert!("gpu".parse::<EngineKind>().is_err());
        assert_eq!(EngineKind::Dense.to_string(), "dense");
    }

    #[test]
    fn test_fixture_spec_at_accumulates_coordinates() {
        let spec = FixtureSpec::new("C", vec![10]).entries(5).at(vec![0]).at(vec![3]);
        assert_eq!(spec.population, Population::At(vec![vec![0], vec![3]]));

        let c = spec.build().unwrap();
        assert_eq!(c.nnz(), 2);
        assert_eq!(c.get(&[3]), Some(12));
    }

    #[test]
    fn test_fixture_spec_error_names_fixture() {
        let err = FixtureSpec::new("A", vec![0]).entries(1).build().unwrap_err();
        assert!(matches!(err, HarnessError::Fixture { ref name, .. } if name == "A"));
    }

    #[test]
    fn test_experiment_validate() {
        let empty = ExperimentConfig::new("x");
        assert!(matches!(empty.validate(), Err(HarnessError::NoKernels(_))));

        let zero = ExperimentConfig::new("x").kernel("D(i) = A(i)").repetitions(0);
        assert!(zero.validate().is_err());

        let dup = ExperimentConfig::new("x")
            .fixture(FixtureSpec::new("A", vec![4]))
            .fixture(FixtureSpec::new("A", vec![4]))
            .kernel("D(i) = A(i)");
        assert!(dup.validate().is_err());
    }
}
