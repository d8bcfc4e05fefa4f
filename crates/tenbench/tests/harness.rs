//! Whole-harness runs over the catalogue at the smallest sizes

use anyhow::Result;
use tenbench::catalog::{experiments, EXPERIMENTS};
use tenbench::report::CSV_HEADER;
use tenbench::{run_experiment, EngineKind, ExperimentReport, HarnessConfig, Reporter};

fn tiny(engine: EngineKind) -> HarnessConfig {
    HarnessConfig {
        scale: usize::MAX,
        repetitions: 2,
        warmup: 1,
        engine,
        csv: true,
    }
}

fn run_all(harness: &HarnessConfig) -> Result<Vec<ExperimentReport>> {
    let mut reports = Vec::new();
    for config in experiments("all", harness)? {
        reports.push(run_experiment(&config, harness.engine)?);
    }
    Ok(reports)
}

#[test]
fn test_catalogue_runs_on_reference_engine() -> Result<()> {
    let reports = run_all(&tiny(EngineKind::Reference))?;
    assert!(reports.len() >= EXPERIMENTS.len());
    for report in &reports {
        assert!(!report.kernels.is_empty());
        for kernel in &report.kernels {
            assert_eq!(kernel.samples.len(), 2, "{} {}", report.label, kernel.label);
            assert_eq!(kernel.engine, "reference");
        }
    }
    Ok(())
}

/// Both engines store the same number of output entries for every kernel
#[test]
fn test_engines_agree_on_output_sizes() -> Result<()> {
    let reference = run_all(&tiny(EngineKind::Reference))?;
    let dense = run_all(&tiny(EngineKind::Dense))?;

    assert_eq!(reference.len(), dense.len());
    for (r, d) in reference.iter().zip(&dense) {
        assert_eq!(r.label, d.label);
        for (rk, dk) in r.kernels.iter().zip(&d.kernels) {
            assert_eq!(rk.label, dk.label);
            assert_eq!(rk.output_nnz, dk.output_nnz, "{} {}", r.label, rk.label);
        }
    }
    Ok(())
}

/// Commuted factors store identical output patterns
#[test]
fn test_commuted_kernels_same_size() -> Result<()> {
    let harness = tiny(EngineKind::Reference);
    for name in ["1", "2", "3"] {
        for config in experiments(name, &harness)? {
            let report = run_experiment(&config, harness.engine)?;
            assert_eq!(report.kernels[0].output_nnz, report.kernels[1].output_nnz);
        }
    }
    Ok(())
}

#[test]
fn test_text_and_csv_output() -> Result<()> {
    let harness = tiny(EngineKind::Reference);
    let configs = experiments("1", &harness)?;
    let report = run_experiment(&configs[0], harness.engine)?;

    let mut reporter = Reporter::new(Vec::new());
    reporter.report(&report)?;
    reporter.write_csv(std::slice::from_ref(&report))?;
    let out = String::from_utf8(reporter.into_inner())?;

    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], "Experiment # 1");
    assert!(lines[1].starts_with("D(i) Time: "));
    assert!(lines.iter().any(|l| l.starts_with("E(i) Time: ")));

    let header = lines.iter().position(|l| *l == CSV_HEADER).unwrap();
    let rows = &lines[header + 1..];
    assert_eq!(rows.len(), 4);
    assert!(rows[0].starts_with("1,D(i),0,"));
    assert!(rows[3].starts_with("1,E(i),1,"));
    Ok(())
}

#[cfg(feature = "serde")]
#[test]
fn test_config_and_report_serde() -> Result<()> {
    use tenbench::ExperimentConfig;

    let harness = tiny(EngineKind::Reference);
    let configs = experiments("scheduled", &harness)?;
    let json = serde_json::to_string(&configs[0])?;
    let back: ExperimentConfig = serde_json::from_str(&json)?;
    assert_eq!(back, configs[0]);

    let report = run_experiment(&back, harness.engine)?;
    let json = serde_json::to_string(&report)?;
    let back: ExperimentReport = serde_json::from_str(&json)?;
    assert_eq!(back, report);

    let json = serde_json::to_string(&harness)?;
    assert!(json.contains("\"engine\":\"reference\""));
    Ok(())
}
