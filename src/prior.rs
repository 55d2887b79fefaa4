//! External-prior normalization.
//!
//! Raw prior probabilities arrive unnormalized (and sometimes missing).
//! Before fusion they are normalized within each `(node, parent
//! assignment)` slice: missing values count as zero, and a slice whose
//! total is zero becomes the uniform distribution over its rows. Note the
//! contrast with fusion's renormalization, which passes a zero-sum slice
//! through untouched: an all-zero *prior* slice carries no information at
//! all, so uniform is the only sensible stand-in.

use std::collections::HashMap;

use crate::cpt::ParentAssignment;
use crate::fusion::FusionInput;

/// Normalizes the `prior_probability` column of `rows` in place, per
/// `(node, assignment)` slice. Afterwards every row has `Some` prior.
pub fn normalize_priors(rows: &mut [FusionInput]) {
    let mut groups: HashMap<(String, ParentAssignment), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups
            .entry((row.node.clone(), row.assignment.clone()))
            .or_default()
            .push(i);
    }
    for members in groups.into_values() {
        let sum: f64 = members
            .iter()
            .map(|&i| rows[i].prior_probability.unwrap_or(0.0))
            .sum();
        if sum > 0.0 {
            for &i in &members {
                let raw = rows[i].prior_probability.unwrap_or(0.0);
                rows[i].prior_probability = Some(raw / sum);
            }
        } else {
            let uniform = 1.0 / members.len() as f64;
            for &i in &members {
                rows[i].prior_probability = Some(uniform);
            }
        }
    }
}
