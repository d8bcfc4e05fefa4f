//! Parameterised experiment runner
//!
//! Builds an experiment's fixtures once, then runs each kernel through a
//! fresh [`Kernel`] per repetition so every repetition times all three
//! phases. Warm-up repetitions run first and are discarded.

use tenbench_exec::{DenseEngine, Kernel, ReferenceEngine, TensorEngine};
use tenbench_planner::{Assignment, Schedule};
use tenbench_sparse::SparseTensor;

use crate::config::{EngineKind, ExperimentConfig, KernelSpec};
use crate::error::{HarnessError, HarnessResult};
use crate::report::{ExperimentReport, KernelReport};

/// Run `config` on the selected engine
pub fn run_experiment(config: &ExperimentConfig, engine: EngineKind) -> HarnessResult<ExperimentReport> {
    match engine {
        EngineKind::Reference => run_with(&ReferenceEngine::new(), config),
        EngineKind::Dense => run_with(&DenseEngine::new(), config),
    }
}

/// Run `config` on any engine
pub fn run_with<E>(engine: &E, config: &ExperimentConfig) -> HarnessResult<ExperimentReport>
where
    E: TensorEngine<i64>,
{
    config.validate()?;
    let _span = tracing::info_span!("experiment", label = %config.label, engine = engine.name()).entered();

    let fixtures = config
        .fixtures
        .iter()
        .map(|spec| spec.build())
        .collect::<HarnessResult<Vec<SparseTensor<i64>>>>()?;
    for f in &fixtures {
        tracing::debug!(
            fixture = f.name(),
            shape = ?f.shape(),
            nnz = f.nnz(),
            density = f.density(),
            "fixture packed"
        );
    }
    let operands: Vec<&SparseTensor<i64>> = fixtures.iter().collect();

    let mut kernels = Vec::with_capacity(config.kernels.len());
    for spec in &config.kernels {
        kernels.push(run_kernel(engine, spec, &operands, config.repetitions, config.warmup)?);
    }

    Ok(ExperimentReport {
        label: config.label.clone(),
        kernels,
    })
}

fn run_kernel<E>(
    engine: &E,
    spec: &KernelSpec,
    operands: &[&SparseTensor<i64>],
    repetitions: usize,
    warmup: usize,
) -> HarnessResult<KernelReport>
where
    E: TensorEngine<i64>,
{
    let assignment = Assignment::parse(&spec.statement).map_err(|source| HarnessError::Statement {
        kernel: spec.statement.clone(),
        source,
    })?;
    let schedule = spec.schedule.clone().unwrap_or_default();
    let label = kernel_label(&assignment, spec.schedule.as_ref());
    let _span = tracing::info_span!("kernel", label = %label).entered();

    let mut samples = Vec::with_capacity(repetitions);
    let mut output_nnz = 0;
    for rep in 0..warmup + repetitions {
        let mut kernel = Kernel::new(engine, assignment.clone(), operands.to_vec()).with_schedule(schedule.clone());
        let timings = kernel.run().map_err(|source| HarnessError::Kernel {
            kernel: label.clone(),
            source,
        })?;
        output_nnz = kernel.output().map_or(0, |t| t.nnz());

        if rep < warmup {
            tracing::trace!(rep, "warm-up discarded");
            continue;
        }
        tracing::debug!(
            rep = rep - warmup,
            compute_us = timings.compute.as_micros() as u64,
            "repetition timed"
        );
        samples.push(timings);
    }

    Ok(KernelReport {
        label,
        engine: engine.name().to_string(),
        samples,
        output_nnz,
    })
}

/// Output access, plus the schedule when one was given
pub fn kernel_label(assignment: &Assignment, schedule: Option<&Schedule>) -> String {
    match schedule {
        Some(s) => format!("{} [{}]", assignment.lhs(), s),
        None => assignment.lhs().to_string(),
    }
}
