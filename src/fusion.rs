//! Coverage-thresholded selection between two probability sources, with
//! per-slice renormalization.
//!
//! For one percentile parameter `p`, the engine computes the `p`-th
//! percentile of the coverage-count column over the whole input table,
//! selects the external-prior probability for every row whose coverage is
//! at or below that threshold and the data-derived probability otherwise,
//! then renormalizes within each `(node, parent assignment)` slice so the
//! fused values form a valid conditional distribution. Runs for different
//! `p` values are fully independent.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cpt::{ParentAssignment, Row};
use crate::error::DataCompletenessError;

/// Which probability source a row drew from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceChoice {
    /// The estimate learned from historical data.
    DataDerived,

    /// The externally supplied (LLM) prior.
    ExternalPrior,
}

impl fmt::Display for SourceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataDerived => write!(f, "data-derived"),
            Self::ExternalPrior => write!(f, "external prior"),
        }
    }
}

/// One fusion-input row: an expanded CPT position with both candidate
/// probabilities and its coverage count.
///
/// Either probability may be absent; absence only becomes an error if the
/// threshold rule selects the absent source for that row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionInput {
    /// Target node id.
    pub node: String,

    /// Target state id.
    pub state: String,

    /// Complete assignment over the node's own parents.
    pub assignment: ParentAssignment,

    /// Probability estimated from historical data.
    pub data_probability: Option<f64>,

    /// Normalized external-prior probability.
    pub prior_probability: Option<f64>,

    /// Number of historical observations matching `assignment`.
    pub coverage: u64,
}

/// One fused row: the selected raw value and its renormalized probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedRow {
    /// Target node id.
    pub node: String,

    /// Target state id.
    pub state: String,

    /// Complete assignment over the node's own parents.
    pub assignment: ParentAssignment,

    /// Source selected by the threshold rule.
    pub source: SourceChoice,

    /// Selected value before renormalization.
    pub raw: f64,

    /// Renormalized probability. Equal to `raw` in a degenerate slice.
    pub fused: f64,
}

impl FusedRow {
    /// The fused row as a plain [`Row`] carrying the fused probability,
    /// ready for [`crate::cpt::collapse`].
    #[must_use]
    pub fn to_row(&self) -> Row {
        Row {
            node: self.node.clone(),
            state: self.state.clone(),
            assignment: self.assignment.clone(),
            probability: self.fused,
        }
    }
}

/// Result of one fusion run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusionOutcome {
    /// Percentile parameter this run used.
    pub percentile: u8,

    /// Coverage threshold derived from the percentile.
    pub threshold: f64,

    /// Fused rows in input order.
    pub rows: Vec<FusedRow>,

    /// Slices whose raw values summed to zero and were passed through
    /// unnormalized. Non-fatal, but such slices do not sum to 1.
    pub degenerate_slices: Vec<(String, ParentAssignment)>,

    /// How many rows selected the external-prior source.
    pub prior_selected: usize,
}

/// Linear-interpolation percentile over `values`, `p` in `[0, 100]`.
///
/// Matches the conventional definition: with the values sorted ascending,
/// rank `r = p/100 * (n - 1)`, interpolating between the neighbouring
/// order statistics. Returns `None` for an empty slice.
#[must_use]
pub fn percentile(values: &[u64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    sorted.sort_by(f64::total_cmp);
    let p = p.clamp(0.0, 100.0);
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        Some(sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo]))
    }
}

/// Runs one fusion pass for percentile parameter `p`.
///
/// Selection is per row, not per node: rows of the same node can draw
/// from different sources depending on their own coverage. Output rows
/// preserve input order.
///
/// # Errors
/// `EmptyCoverage` if the input table is empty; `MissingSourceValue` if
/// the selected source of any row has no value (a default is never
/// substituted here).
pub fn fuse(inputs: &[FusionInput], p: u8) -> Result<FusionOutcome, DataCompletenessError> {
    let coverages: Vec<u64> = inputs.iter().map(|i| i.coverage).collect();
    let threshold =
        percentile(&coverages, f64::from(p)).ok_or(DataCompletenessError::EmptyCoverage)?;

    let mut rows = Vec::with_capacity(inputs.len());
    let mut prior_selected = 0usize;
    for input in inputs {
        let source = if input.coverage as f64 <= threshold {
            SourceChoice::ExternalPrior
        } else {
            SourceChoice::DataDerived
        };
        let raw = match source {
            SourceChoice::ExternalPrior => input.prior_probability,
            SourceChoice::DataDerived => input.data_probability,
        }
        .ok_or_else(|| DataCompletenessError::MissingSourceValue {
            node: input.node.clone(),
            state: input.state.clone(),
            assignment: input.assignment.to_string(),
            selected: source,
        })?;
        if source == SourceChoice::ExternalPrior {
            prior_selected += 1;
        }
        rows.push(FusedRow {
            node: input.node.clone(),
            state: input.state.clone(),
            assignment: input.assignment.clone(),
            source,
            raw,
            fused: raw,
        });
    }

    // Renormalize per (node, assignment) slice. Zero-sum slices are left
    // as their raw values and flagged.
    let mut groups: HashMap<(String, ParentAssignment), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups
            .entry((row.node.clone(), row.assignment.clone()))
            .or_default()
            .push(i);
    }
    let mut degenerate_slices = Vec::new();
    for ((node, assignment), members) in groups {
        let sum: f64 = members.iter().map(|&i| rows[i].raw).sum();
        if sum > 0.0 {
            for &i in &members {
                rows[i].fused = rows[i].raw / sum;
            }
        } else {
            degenerate_slices.push((node, assignment));
        }
    }
    degenerate_slices.sort();

    Ok(FusionOutcome {
        percentile: p,
        threshold,
        rows,
        degenerate_slices,
        prior_selected,
    })
}
