//! Timing reports
//!
//! A [`Reporter`] is a pure sink: it renders [`ExperimentReport`]s as text
//! and CSV into any `io::Write`. Text output keeps the one-line-per-kernel
//! layout of the first experiment drivers:
//!
//! ```text
//! Experiment # 1
//! D(i) Time: 153 us (compile 20 us, assemble 41 us)
//! ```
//!
//! With more than one timed repetition each line reports medians and is
//! followed by a per-phase min/mean/median/max summary.

use std::io::Write;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use tenbench_exec::PhaseTimings;

use crate::error::HarnessResult;

/// Header of the CSV rendering
pub const CSV_HEADER: &str = "experiment,kernel,repetition,compile_us,assemble_us,compute_us";

/// Summary statistics of one phase over repetitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stats {
    pub min: Duration,
    pub mean: Duration,
    pub median: Duration,
    pub max: Duration,
}

impl Stats {
    /// Statistics of `samples`; all zero when empty
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let total: Duration = sorted.iter().sum();

        Self {
            min: sorted[0],
            mean: total / sorted.len() as u32,
            median: percentile(&sorted, 0.5),
            max: sorted[sorted.len() - 1],
        }
    }
}

/// Sample at fraction `p` of sorted data
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    let idx = (sorted.len() as f64 * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Per-phase statistics of one kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PhaseStats {
    pub compile: Stats,
    pub assemble: Stats,
    pub compute: Stats,
}

/// Timed repetitions of one kernel
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KernelReport {
    /// Output access, with the schedule when one is set (e.g. `D(i) [reorder(j, i)]`)
    pub label: String,
    pub engine: String,
    /// Timings of the repetitions after warm-up, in run order
    pub samples: Vec<PhaseTimings>,
    /// Stored output entries after the last repetition
    pub output_nnz: usize,
}

impl KernelReport {
    pub fn stats(&self) -> PhaseStats {
        let phase = |f: fn(&PhaseTimings) -> Duration| {
            Stats::from_samples(&self.samples.iter().map(f).collect::<Vec<_>>())
        };
        PhaseStats {
            compile: phase(|t| t.compile),
            assemble: phase(|t| t.assemble),
            compute: phase(|t| t.compute),
        }
    }
}

/// Every kernel report of one experiment
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExperimentReport {
    pub label: String,
    pub kernels: Vec<KernelReport>,
}

/// Renders reports into a writer
#[derive(Debug)]
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the text block of one experiment
    pub fn report(&mut self, report: &ExperimentReport) -> HarnessResult<()> {
        writeln!(self.out, "Experiment # {}", report.label)?;
        for kernel in &report.kernels {
            self.kernel_line(kernel)?;
        }
        self.out.flush()?;
        Ok(())
    }

    fn kernel_line(&mut self, kernel: &KernelReport) -> HarnessResult<()> {
        let stats = kernel.stats();
        writeln!(
            self.out,
            "{} Time: {} us (compile {} us, assemble {} us)",
            kernel.label,
            stats.compute.median.as_micros(),
            stats.compile.median.as_micros(),
            stats.assemble.median.as_micros()
        )?;

        if kernel.samples.len() > 1 {
            for (phase, s) in [
                ("compile", stats.compile),
                ("assemble", stats.assemble),
                ("compute", stats.compute),
            ] {
                writeln!(
                    self.out,
                    "  {:<8} min {} us, mean {} us, median {} us, max {} us ({} reps)",
                    phase,
                    s.min.as_micros(),
                    s.mean.as_micros(),
                    s.median.as_micros(),
                    s.max.as_micros(),
                    kernel.samples.len()
                )?;
            }
        }
        Ok(())
    }

    /// Write the CSV header and one row per timed repetition
    pub fn write_csv(&mut self, reports: &[ExperimentReport]) -> HarnessResult<()> {
        writeln!(self.out, "{}", CSV_HEADER)?;
        for report in reports {
            for kernel in &report.kernels {
                for (rep, t) in kernel.samples.iter().enumerate() {
                    writeln!(
                        self.out,
                        "{},{},{},{},{},{}",
                        csv_field(&report.label),
                        csv_field(&kernel.label),
                        rep,
                        t.compile.as_micros(),
                        t.assemble.as_micros(),
                        t.compute.as_micros()
                    )?;
                }
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Quote a field holding a comma, quote or newline
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
