//! Flat-array ⇄ row-table CPT conversion.
//!
//! The flat probability array of a node is ordered by *combination order*:
//! the Cartesian product of the parents' declared state lists, parents in
//! declared order with the rightmost varying fastest, and within each
//! combination one entry per own state in declared order. [`expand`] walks
//! that order to produce rows; [`collapse`] walks the same order to
//! reassemble the array. The two directions share [`CptIndex`], which also
//! exposes the explicit `(assignment, state) -> offset` function so the
//! ordering convention lives in exactly one place.
//!
//! `collapse(expand(a)) == a` holds exactly for any array whose length
//! matches its node's expected length.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::network::{Network, Node};

/// A complete assignment of one state to each parent of a node.
///
/// Entries are kept sorted by parent id so that equality and hashing do
/// not depend on the order rows were built in; the declared parent order
/// only matters for combination enumeration, which [`CptIndex`] owns.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ParentAssignment {
    entries: Vec<(String, String)>,
}

impl ParentAssignment {
    /// Builds an assignment from `(parent_id, state_id)` pairs.
    #[must_use]
    pub fn new(mut pairs: Vec<(String, String)>) -> Self {
        pairs.sort();
        Self { entries: pairs }
    }

    /// The empty assignment of a root node.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The assigned state of `parent`, if present.
    #[must_use]
    pub fn get(&self, parent: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == parent)
            .map(|(_, s)| s.as_str())
    }

    /// Iterates `(parent_id, state_id)` pairs, sorted by parent id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, s)| (p.as_str(), s.as_str()))
    }

    /// Number of assigned parents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for the empty (root) assignment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParentAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "(root)");
        }
        for (i, (parent, state)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parent}={state}")?;
        }
        Ok(())
    }
}

/// One expanded CPT entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Target node id.
    pub node: String,

    /// Target state id.
    pub state: String,

    /// Complete assignment over the node's own parents (empty for roots).
    pub assignment: ParentAssignment,

    /// Probability of `state` given `assignment`, in `[0, 1]`.
    pub probability: f64,
}

/// Deterministic map between `(parent assignment, target state)` and flat
/// array offsets for one node, computed once from the declared orders.
#[derive(Debug)]
pub struct CptIndex<'a> {
    node: &'a Node,
    parent_states: Vec<(&'a str, &'a [String])>,
}

impl<'a> CptIndex<'a> {
    /// Builds the index for `node`, resolving parent state lists from
    /// `network`.
    ///
    /// # Errors
    /// `MissingStates` if the node has no states, `DanglingParent` if a
    /// declared parent is absent from the network.
    pub fn new(node: &'a Node, network: &'a Network) -> Result<Self, FormatError> {
        if node.states.is_empty() {
            return Err(FormatError::MissingStates {
                node: node.id.clone(),
            });
        }
        let mut parent_states = Vec::with_capacity(node.parents.len());
        for parent in &node.parents {
            let states = network
                .states(parent)
                .ok_or_else(|| FormatError::DanglingParent {
                    node: node.id.clone(),
                    parent: parent.clone(),
                })?;
            parent_states.push((parent.as_str(), states));
        }
        Ok(Self {
            node,
            parent_states,
        })
    }

    /// Own state count `k`.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.node.states.len()
    }

    /// Number of parent-state combinations (1 for a root node).
    #[must_use]
    pub fn combination_count(&self) -> usize {
        self.parent_states.iter().map(|(_, s)| s.len()).product()
    }

    /// Expected flat-array length.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.combination_count() * self.state_count()
    }

    /// All parent assignments in combination order. A root node yields the
    /// single empty assignment.
    #[must_use]
    pub fn assignments(&self) -> Vec<ParentAssignment> {
        let cards: Vec<usize> = self.parent_states.iter().map(|(_, s)| s.len()).collect();
        let total = self.combination_count();
        let mut digits = vec![0usize; cards.len()];
        let mut out = Vec::with_capacity(total);
        for _ in 0..total {
            let pairs = self
                .parent_states
                .iter()
                .zip(&digits)
                .map(|((parent, states), &d)| ((*parent).to_string(), states[d].clone()))
                .collect();
            out.push(ParentAssignment::new(pairs));
            for pos in (0..digits.len()).rev() {
                digits[pos] += 1;
                if digits[pos] < cards[pos] {
                    break;
                }
                digits[pos] = 0;
            }
        }
        out
    }

    /// Flat-array offset of `(assignment, state)`, or `None` if the state
    /// or any assigned parent state is unknown.
    #[must_use]
    pub fn offset(&self, assignment: &ParentAssignment, state: &str) -> Option<usize> {
        let state_idx = self.node.states.iter().position(|s| s == state)?;
        let mut combination = 0usize;
        for (parent, states) in &self.parent_states {
            let assigned = assignment.get(parent)?;
            let idx = states.iter().position(|s| s == assigned)?;
            combination = combination * states.len() + idx;
        }
        Some(combination * self.state_count() + state_idx)
    }
}

/// Expands a node's flat array into one [`Row`] per array entry, in
/// combination order.
///
/// # Errors
/// Structural errors from [`CptIndex::new`], or `ArrayLengthMismatch` if
/// the array does not have the expected length.
pub fn expand(node: &Node, network: &Network) -> Result<Vec<Row>, FormatError> {
    let index = CptIndex::new(node, network)?;
    if node.probabilities.len() != index.expected_len() {
        return Err(FormatError::ArrayLengthMismatch {
            node: node.id.clone(),
            expected: index.expected_len(),
            actual: node.probabilities.len(),
        });
    }
    let mut rows = Vec::with_capacity(node.probabilities.len());
    let mut cursor = 0usize;
    for assignment in index.assignments() {
        for state in &node.states {
            // The sequential walk and the offset function must agree.
            debug_assert_eq!(index.offset(&assignment, state), Some(cursor));
            rows.push(Row {
                node: node.id.clone(),
                state: state.clone(),
                assignment: assignment.clone(),
                probability: node.probabilities[cursor],
            });
            cursor += 1;
        }
    }
    Ok(rows)
}

/// Result of [`collapse`]: the reassembled flat array plus the number of
/// `(combination, state)` pairs that had no matching row and received the
/// uniform `1/k` fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collapsed {
    /// Flat array in combination order.
    pub values: Vec<f64>,

    /// How many entries fell back to `1/k`.
    pub fallback_entries: usize,
}

/// Reassembles a node's flat array from a row table, the exact inverse of
/// [`expand`].
///
/// Rows for other nodes are ignored. An expected `(combination, state)`
/// pair with no matching row yields the uniform `1/k` — a deliberate
/// low-confidence default for combinations unseen in the fused table, not
/// an error. The count of such entries is reported in
/// [`Collapsed::fallback_entries`].
///
/// # Errors
/// Structural errors from [`CptIndex::new`].
pub fn collapse(rows: &[Row], node: &Node, network: &Network) -> Result<Collapsed, FormatError> {
    let index = CptIndex::new(node, network)?;
    let uniform = 1.0 / index.state_count() as f64;

    let mut lookup: HashMap<(String, ParentAssignment), f64> = HashMap::new();
    for row in rows.iter().filter(|r| r.node == node.id) {
        lookup.insert((row.state.clone(), row.assignment.clone()), row.probability);
    }

    let mut values = Vec::with_capacity(index.expected_len());
    let mut fallback_entries = 0usize;
    for assignment in index.assignments() {
        for state in &node.states {
            match lookup.get(&(state.clone(), assignment.clone())) {
                Some(&p) => values.push(p),
                None => {
                    values.push(uniform);
                    fallback_entries += 1;
                }
            }
        }
    }
    Ok(Collapsed {
        values,
        fallback_entries,
    })
}
