//! `tenbench [EXPERIMENT]`
//!
//! Runs one catalogue experiment (default `2`) and prints its timing report
//! to stdout. Logs go to stderr.

use std::io;

use anyhow::{Context, Result};
use tenbench::catalog::{self, DEFAULT_EXPERIMENT, EXPERIMENTS};
use tenbench::telemetry::{init_telemetry, TelemetryConfig};
use tenbench::{run_experiment, HarnessConfig, Reporter};

fn usage() -> String {
    format!(
        "usage: tenbench [EXPERIMENT]\n\nexperiments: {}, all (default {})\n\n\
         environment: TENBENCH_SCALE TENBENCH_REPS TENBENCH_WARMUP TENBENCH_ENGINE \
         TENBENCH_CSV TENBENCH_LOG_FORMAT RUST_LOG",
        EXPERIMENTS.join(", "),
        DEFAULT_EXPERIMENT
    )
}

fn main() -> Result<()> {
    let name = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_EXPERIMENT.to_string());
    if name == "-h" || name == "--help" {
        println!("{}", usage());
        return Ok(());
    }

    init_telemetry(TelemetryConfig::default()).context("failed to initialise logging")?;
    let harness = HarnessConfig::from_env()?;
    tracing::info!(
        experiment = %name,
        scale = harness.scale,
        engine = %harness.engine,
        repetitions = harness.repetitions,
        warmup = harness.warmup,
        "starting"
    );

    let configs = catalog::experiments(&name, &harness)?;
    let stdout = io::stdout();
    let mut reporter = Reporter::new(stdout.lock());
    let mut reports = Vec::with_capacity(configs.len());
    for config in &configs {
        let report = run_experiment(config, harness.engine)
            .with_context(|| format!("experiment '{}' failed", config.label))?;
        reporter.report(&report)?;
        reports.push(report);
    }

    if harness.csv {
        reporter.write_csv(&reports)?;
    }
    Ok(())
}
