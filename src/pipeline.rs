//! Batch driver: one independent fuse/update/save run per percentile.
//!
//! Each percentile parameter produces its own fused table and its own
//! output network file; there is no shared mutable state between runs, so
//! they are farmed out to a small worker pool over bounded channels. A
//! failed run is reported for its percentile and never aborts the others.

use std::path::PathBuf;
use std::thread;

use crossbeam_channel::bounded;
use serde::Serialize;

use crate::cpt::Row;
use crate::error::CptResult;
use crate::fusion::{self, FusionInput};
use crate::network::xdsl::XdslDocument;
use crate::writer;

/// Configuration for a batch of percentile runs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Percentile parameters to run, each in `0..=100`.
    pub percentiles: Vec<u8>,

    /// Directory receiving the output networks.
    pub out_dir: PathBuf,

    /// Output files are named `<prefix>_P<percentile>.xdsl`.
    pub prefix: String,

    /// Worker threads; capped at the number of percentiles.
    pub workers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            percentiles: (0..=100).step_by(10).map(|p| p as u8).collect(),
            out_dir: PathBuf::from("."),
            prefix: "fused".to_string(),
            workers: 4,
        }
    }
}

/// Summary of one completed percentile run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileRun {
    /// Percentile parameter of this run.
    pub percentile: u8,

    /// Coverage threshold the percentile resolved to.
    pub threshold: f64,

    /// Rows that drew from the external prior.
    pub prior_selected: usize,

    /// Conditional-distribution slices left unnormalized (zero sum).
    pub degenerate_slices: usize,

    /// Array entries that fell back to the uniform default on collapse.
    pub fallback_entries: usize,

    /// Path of the written network file.
    pub output: PathBuf,
}

/// Runs fusion for a single percentile and writes the resulting network.
///
/// # Errors
/// Fusion, structural, or I/O errors for this run only.
pub fn run_percentile(
    doc: &XdslDocument,
    inputs: &[FusionInput],
    percentile: u8,
    config: &BatchConfig,
) -> CptResult<PercentileRun> {
    let outcome = fusion::fuse(inputs, percentile)?;
    let rows: Vec<Row> = outcome.rows.iter().map(|r| r.to_row()).collect();
    let (updated, report) = writer::update(doc.network(), &rows)?;
    let output = config
        .out_dir
        .join(format!("{}_P{}.xdsl", config.prefix, percentile));
    doc.save_to_path(&updated, &output)?;
    Ok(PercentileRun {
        percentile,
        threshold: outcome.threshold,
        prior_selected: outcome.prior_selected,
        degenerate_slices: outcome.degenerate_slices.len(),
        fallback_entries: report.fallback_entries,
        output,
    })
}

/// Runs every configured percentile, returning one result per percentile
/// sorted ascending. Failures are isolated: each percentile carries its
/// own `CptResult`.
#[must_use]
pub fn run_batch(
    doc: &XdslDocument,
    inputs: &[FusionInput],
    config: &BatchConfig,
) -> Vec<(u8, CptResult<PercentileRun>)> {
    let jobs = config.percentiles.len();
    if jobs == 0 {
        return Vec::new();
    }
    let workers = config.workers.clamp(1, jobs);
    let (job_tx, job_rx) = bounded::<u8>(jobs);
    let (result_tx, result_rx) = bounded::<(u8, CptResult<PercentileRun>)>(jobs);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(percentile) = job_rx.recv() {
                    let result = run_percentile(doc, inputs, percentile, config);
                    if result_tx.send((percentile, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(result_tx);

        for &percentile in &config.percentiles {
            // Channel capacity equals the job count, so this never blocks.
            let _ = job_tx.send(percentile);
        }
        drop(job_tx);

        let mut results: Vec<(u8, CptResult<PercentileRun>)> = result_rx.iter().collect();
        results.sort_by_key(|(p, _)| *p);
        results
    })
}
