//! Built-in experiment catalogue
//!
//! Problem sizes are the sizes the experiments were first run at, divided by
//! [`HarnessConfig::scale`]. Every fixture value is 12 and every seed is
//! fixed, so two runs at the same scale time the same problems.
//!
//! | Name | Kernels |
//! |------|---------|
//! | `1` | `D(i) = A(i)*B(i)*C(i)` and its commuted form, `C` a single entry |
//! | `2` | `D(i) = A(i,j)*B(i,j)*C(j)` and its commuted form |
//! | `3` | as `2` with a third-order `A` |
//! | `chain` | matrix chain forward, backward, summed, elementwise |
//! | `sweep` | `chain` over decreasing densities of `C` |
//! | `scheduled` | experiment 2's first kernel under split, reorder and parallel schedules |
//! | `all` | every experiment above |

use tenbench_planner::{OutputRaceStrategy, ParallelUnit, Schedule};

use crate::config::{ExperimentConfig, FixtureSpec, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};

/// Experiment run when none is named
pub const DEFAULT_EXPERIMENT: &str = "2";

/// Names accepted by [`experiments`], excluding `all`
pub const EXPERIMENTS: &[&str] = &["1", "2", "3", "chain", "sweep", "scheduled"];

/// Densities of `C` visited by the sweep
pub const SWEEP_DENSITIES: &[f64] = &[0.1, 0.01, 0.001, 0.0001, 0.00001, 0.000001];

const CHAIN_DENSITY: f64 = 0.5;
const CHAIN_C_DENSITY: f64 = 0.01;

/// Resolve a catalogue name into the experiments it runs
pub fn experiments(name: &str, harness: &HarnessConfig) -> HarnessResult<Vec<ExperimentConfig>> {
    let configs = match name {
        "1" => vec![experiment_1(harness)],
        "2" => vec![experiment_2(harness)],
        "3" => vec![experiment_3(harness)],
        "chain" => vec![chain(harness, CHAIN_C_DENSITY)],
        "sweep" => sweep(harness),
        "scheduled" => vec![scheduled(harness)],
        "all" => {
            let mut all = Vec::new();
            for name in EXPERIMENTS {
                all.extend(experiments(name, harness)?);
            }
            all
        }
        _ => {
            return Err(HarnessError::UnknownExperiment {
                name: name.to_string(),
                known: format!("{}, all", EXPERIMENTS.join(", ")),
            })
        }
    };
    Ok(configs)
}

fn repeated(config: ExperimentConfig, harness: &HarnessConfig) -> ExperimentConfig {
    config.repetitions(harness.repetitions).warmup(harness.warmup)
}

/// Elementwise product of two random vectors and a single-entry vector
pub fn experiment_1(harness: &HarnessConfig) -> ExperimentConfig {
    let dim = harness.scaled(100_000_000, 16);
    let nnz = harness.scaled(10_000_000, 1);

    let config = ExperimentConfig::new("1")
        .fixture(FixtureSpec::new("A", vec![dim]).entries(nnz).seed(1))
        .fixture(FixtureSpec::new("B", vec![dim]).entries(nnz).seed(2))
        .fixture(FixtureSpec::new("C", vec![dim]).at(vec![0]))
        .kernel("D(i) = A(i) * B(i) * C(i)")
        .kernel("E(i) = C(i) * A(i) * B(i)");
    repeated(config, harness)
}

/// Two random matrices contracted against a single-entry vector
pub fn experiment_2(harness: &HarnessConfig) -> ExperimentConfig {
    let dim = harness.scaled(1_000_000, 16);
    let nnz = harness.scaled(10_000_000, 1);

    let config = ExperimentConfig::new("2")
        .fixture(FixtureSpec::new("A", vec![dim, dim]).entries(nnz).seed(1))
        .fixture(FixtureSpec::new("B", vec![dim, dim]).entries(nnz).seed(2))
        .fixture(FixtureSpec::new("C", vec![dim]).entries(1).seed(3))
        .kernel("D(i) = A(i,j) * B(i,j) * C(j)")
        .kernel("E(i) = C(j) * A(i,j) * B(i,j)");
    repeated(config, harness)
}

/// Experiment 2 with a third-order tensor summed over two modes
pub fn experiment_3(harness: &HarnessConfig) -> ExperimentConfig {
    let dim = harness.scaled(1_000_000, 16);
    let nnz = harness.scaled(10_000_000, 1);

    let config = ExperimentConfig::new("3")
        .fixture(FixtureSpec::new("A", vec![dim, dim, dim]).entries(nnz).seed(1))
        .fixture(FixtureSpec::new("B", vec![dim, dim]).entries(nnz).seed(2))
        .fixture(FixtureSpec::new("C", vec![dim]).entries(1).seed(3))
        .kernel("D(i) = A(i,j,k) * B(i,j) * C(k)")
        .kernel("E(i) = C(k) * A(i,j,k) * B(i,j)");
    repeated(config, harness)
}

/// Square matrix chain with a sparser `C`, in both association orders
pub fn chain(harness: &HarnessConfig, c_density: f64) -> ExperimentConfig {
    let n = harness.scaled(10_000, 8);

    let config = ExperimentConfig::new(format!("chain d={}", c_density))
        .fixture(FixtureSpec::new("A", vec![n, n]).density(CHAIN_DENSITY).seed(11))
        .fixture(FixtureSpec::new("B", vec![n, n]).density(CHAIN_DENSITY).seed(12))
        .fixture(FixtureSpec::new("C", vec![n, n]).density(c_density).seed(13))
        .kernel("E(i,l) = A(i,j) * B(j,k) * C(k,l)")
        .kernel("F(i,l) = C(i,j) * B(j,k) * A(k,l)")
        .kernel("S() = A(i,j) * B(j,k) * C(k,l)")
        .kernel("G(i,j) = A(i,j) * B(i,j) * C(i,j)");
    repeated(config, harness)
}

/// The chain at every density of [`SWEEP_DENSITIES`]
pub fn sweep(harness: &HarnessConfig) -> Vec<ExperimentConfig> {
    SWEEP_DENSITIES.iter().map(|&d| chain(harness, d)).collect()
}

/// Experiment 2's first kernel under every schedule family
pub fn scheduled(harness: &HarnessConfig) -> ExperimentConfig {
    let stmt = "D(i) = A(i,j) * B(i,j) * C(j)";
    let tile = harness.scaled(6_400, 2);

    let mut config = experiment_2(harness);
    config.label = "scheduled".to_string();
    config.kernels.truncate(1);
    config
        .scheduled(stmt, Schedule::new().split("i", "i0", "i1", tile))
        .scheduled(stmt, Schedule::new().reorder(["j", "i"]))
        .scheduled(
            stmt,
            Schedule::new().parallelize("i", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces),
        )
        .scheduled(
            stmt,
            Schedule::new()
                .split("i", "i0", "i1", tile)
                .parallelize("i0", ParallelUnit::CpuThread, OutputRaceStrategy::NoRaces),
        )
        .scheduled(
            stmt,
            Schedule::new()
                .reorder(["j", "i"])
                .parallelize("j", ParallelUnit::CpuThread, OutputRaceStrategy::Atomics),
        )
        .scheduled(
            stmt,
            Schedule::new()
                .reorder(["j", "i"])
                .parallelize("j", ParallelUnit::CpuThread, OutputRaceStrategy::Temporary),
        )
}
