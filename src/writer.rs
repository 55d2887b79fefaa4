//! Substitutes fused row tables back into a template network.
//!
//! Every node present in the row table gets its flat array rebuilt via
//! [`crate::cpt::collapse`]; nodes absent from the table pass through with
//! their original array untouched. The result is a fresh [`Network`] — the
//! template is never mutated — plus a report of what changed.

use std::collections::HashMap;

use serde::Serialize;

use crate::cpt::{self, Row};
use crate::error::FormatError;
use crate::network::Network;

/// What [`update`] did: which nodes were rebuilt and how many array
/// entries fell back to the uniform default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Ids of nodes whose arrays were rebuilt, in document order.
    pub updated_nodes: Vec<String>,

    /// Total `1/k` fallback entries across all rebuilt nodes.
    pub fallback_entries: usize,
}

/// Builds a new network from `template` with the probability arrays of
/// every node named in `rows` replaced by the collapsed row values.
///
/// # Errors
/// `UnknownNode` if a row references a node the template does not have;
/// structural errors from collapse otherwise.
pub fn update(template: &Network, rows: &[Row]) -> Result<(Network, UpdateReport), FormatError> {
    let mut by_node: HashMap<&str, Vec<Row>> = HashMap::new();
    for row in rows {
        if template.node(&row.node).is_none() {
            return Err(FormatError::UnknownNode {
                node: row.node.clone(),
            });
        }
        by_node.entry(row.node.as_str()).or_default().push(row.clone());
    }

    let mut out = Network::new();
    let mut report = UpdateReport::default();
    for node in template.nodes() {
        let mut node = node.clone();
        if let Some(node_rows) = by_node.get(node.id.as_str()) {
            let collapsed = cpt::collapse(node_rows, &node, template)?;
            node.probabilities = collapsed.values;
            report.fallback_entries += collapsed.fallback_entries;
            report.updated_nodes.push(node.id.clone());
        }
        out.insert(node)?;
    }
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpt::ParentAssignment;
    use crate::network::Node;

    fn states(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn template() -> Network {
        let mut network = Network::new();
        network
            .insert(Node::root("A", states(&["a1", "a2"]), vec![0.3, 0.7]))
            .unwrap();
        network
            .insert(Node {
                id: "B".to_string(),
                states: states(&["b1", "b2"]),
                parents: vec!["A".to_string()],
                probabilities: vec![0.1, 0.9, 0.8, 0.2],
            })
            .unwrap();
        network
    }

    fn root_row(state: &str, probability: f64) -> Row {
        Row {
            node: "A".to_string(),
            state: state.to_string(),
            assignment: ParentAssignment::empty(),
            probability,
        }
    }

    #[test]
    fn updates_named_nodes_and_passes_others_through() {
        let template = template();
        let rows = vec![root_row("a1", 0.6), root_row("a2", 0.4)];
        let (updated, report) = update(&template, &rows).unwrap();

        assert_eq!(updated.node("A").unwrap().probabilities, [0.6, 0.4]);
        // B had no rows: original array retained, not zeroed.
        assert_eq!(
            updated.node("B").unwrap().probabilities,
            [0.1, 0.9, 0.8, 0.2]
        );
        assert_eq!(report.updated_nodes, ["A".to_string()]);
        assert_eq!(report.fallback_entries, 0);
    }

    #[test]
    fn template_is_not_mutated() {
        let template = template();
        let rows = vec![root_row("a1", 0.6), root_row("a2", 0.4)];
        let _ = update(&template, &rows).unwrap();
        assert_eq!(template.node("A").unwrap().probabilities, [0.3, 0.7]);
    }

    #[test]
    fn partial_rows_fall_back_and_are_counted() {
        let template = template();
        let rows = vec![Row {
            node: "B".to_string(),
            state: "b1".to_string(),
            assignment: ParentAssignment::new(vec![("A".to_string(), "a1".to_string())]),
            probability: 0.25,
        }];
        let (updated, report) = update(&template, &rows).unwrap();
        let b = updated.node("B").unwrap();
        assert_eq!(b.probabilities[0], 0.25);
        assert_eq!(b.probabilities[1], 0.5);
        assert_eq!(b.probabilities[2], 0.5);
        assert_eq!(report.fallback_entries, 3);
    }

    #[test]
    fn unknown_node_is_rejected() {
        let template = template();
        let rows = vec![Row {
            node: "ghost".to_string(),
            state: "s".to_string(),
            assignment: ParentAssignment::empty(),
            probability: 1.0,
        }];
        let err = update(&template, &rows).unwrap_err();
        assert!(matches!(err, FormatError::UnknownNode { .. }));
    }
}
