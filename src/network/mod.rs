//! Discrete Bayesian-network structure.
//!
//! A [`Network`] maps node identifiers to [`Node`]s and exposes the
//! structural queries the rest of the pipeline needs: a node's state list,
//! its declared parent list, and the derived edge relation. Declaration
//! order is significant everywhere: parent order determines the
//! combination order of the flat probability arrays (see [`crate::cpt`]),
//! and node order determines edge iteration and serialization order.

pub mod xdsl;

use std::collections::HashMap;

use crate::error::FormatError;

/// One variable of the network.
///
/// `probabilities` is the flat CPT array: for each combination of parent
/// states (parents in declared order, each parent's states in declared
/// order, rightmost parent varying fastest) it holds one probability per
/// own state, own states in declared order. Its length must equal
/// `states.len()` times the product of the parent cardinalities.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Unique node identifier.
    pub id: String,

    /// Ordered state identifiers. Never empty in a valid network.
    pub states: Vec<String>,

    /// Ordered parent node identifiers. Empty for a root node.
    pub parents: Vec<String>,

    /// Flat CPT array in combination order.
    pub probabilities: Vec<f64>,
}

impl Node {
    /// Creates a root node (no parents).
    #[must_use]
    pub fn root(id: impl Into<String>, states: Vec<String>, probabilities: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            states,
            parents: Vec::new(),
            probabilities,
        }
    }
}

/// A parsed network: nodes in document order plus an id index.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Network {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node, preserving insertion order.
    ///
    /// # Errors
    /// `DuplicateNode` if a node with the same id already exists.
    pub fn insert(&mut self, node: Node) -> Result<(), FormatError> {
        if self.index.contains_key(&node.id) {
            return Err(FormatError::DuplicateNode { node: node.id });
        }
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Iterates nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the network has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The declared state list of a node, if it exists.
    #[must_use]
    pub fn states(&self, id: &str) -> Option<&[String]> {
        self.node(id).map(|n| n.states.as_slice())
    }

    /// The declared parent list of a node, if it exists.
    #[must_use]
    pub fn parents(&self, id: &str) -> Option<&[String]> {
        self.node(id).map(|n| n.parents.as_slice())
    }

    /// Derived `(parent, child)` edge pairs.
    ///
    /// Order: nodes in document order, then each node's declared parent
    /// order.
    #[must_use]
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for node in &self.nodes {
            for parent in &node.parents {
                edges.push((parent.clone(), node.id.clone()));
            }
        }
        edges
    }

    /// Expected flat-array length for a node: own cardinality times the
    /// product of the parent cardinalities.
    ///
    /// # Errors
    /// `DanglingParent` if a declared parent is not in the network.
    pub fn expected_len(&self, node: &Node) -> Result<usize, FormatError> {
        let mut len = node.states.len();
        for parent in &node.parents {
            let states = self
                .states(parent)
                .ok_or_else(|| FormatError::DanglingParent {
                    node: node.id.clone(),
                    parent: parent.clone(),
                })?;
            len *= states.len();
        }
        Ok(len)
    }

    /// Checks the structural invariants of every node: at least one state,
    /// all parents present, flat array length exactly as expected.
    ///
    /// Acyclicity is an external precondition of the input format and is
    /// not checked here.
    ///
    /// # Errors
    /// The first violation found, identifying the offending node.
    pub fn validate(&self) -> Result<(), FormatError> {
        for node in &self.nodes {
            if node.states.is_empty() {
                return Err(FormatError::MissingStates {
                    node: node.id.clone(),
                });
            }
            let expected = self.expected_len(node)?;
            if node.probabilities.len() != expected {
                return Err(FormatError::ArrayLengthMismatch {
                    node: node.id.clone(),
                    expected,
                    actual: node.probabilities.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| (*s).to_string()).collect()
    }

    fn two_node_network() -> Network {
        let mut network = Network::new();
        network
            .insert(Node::root(
                "road_type",
                states(&["State1", "State2"]),
                vec![0.3, 0.7],
            ))
            .unwrap();
        network
            .insert(Node {
                id: "collision_severity".to_string(),
                states: states(&["State1", "State2", "State3"]),
                parents: vec!["road_type".to_string()],
                probabilities: vec![0.2, 0.3, 0.5, 0.1, 0.6, 0.3],
            })
            .unwrap();
        network
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut network = two_node_network();
        let err = network
            .insert(Node::root("road_type", states(&["State1"]), vec![1.0]))
            .unwrap_err();
        assert!(matches!(err, FormatError::DuplicateNode { .. }));
    }

    #[test]
    fn structural_queries() {
        let network = two_node_network();
        assert_eq!(network.len(), 2);
        assert_eq!(network.states("road_type").unwrap().len(), 2);
        assert_eq!(
            network.parents("collision_severity").unwrap(),
            ["road_type".to_string()]
        );
        assert!(network.node("weather").is_none());
    }

    #[test]
    fn edges_follow_document_then_parent_order() {
        let mut network = two_node_network();
        network
            .insert(Node {
                id: "speed_limit".to_string(),
                states: states(&["State30", "State60"]),
                parents: vec!["collision_severity".to_string(), "road_type".to_string()],
                probabilities: vec![0.5; 12],
            })
            .unwrap();
        assert_eq!(
            network.edges(),
            vec![
                ("road_type".to_string(), "collision_severity".to_string()),
                ("collision_severity".to_string(), "speed_limit".to_string()),
                ("road_type".to_string(), "speed_limit".to_string()),
            ]
        );
    }

    #[test]
    fn validate_accepts_well_formed_network() {
        assert!(two_node_network().validate().is_ok());
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let mut network = two_node_network();
        network
            .insert(Node {
                id: "weather".to_string(),
                states: states(&["State1", "State2"]),
                parents: vec!["road_type".to_string()],
                // expected 2 x 2 = 4 entries
                probabilities: vec![0.5, 0.5, 1.0],
            })
            .unwrap();
        let err = network.validate().unwrap_err();
        match err {
            FormatError::ArrayLengthMismatch {
                node,
                expected,
                actual,
            } => {
                assert_eq!(node, "weather");
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_missing_states() {
        let mut network = Network::new();
        network
            .insert(Node::root("empty", Vec::new(), Vec::new()))
            .unwrap();
        assert!(matches!(
            network.validate(),
            Err(FormatError::MissingStates { .. })
        ));
    }

    #[test]
    fn validate_rejects_dangling_parent() {
        let mut network = Network::new();
        network
            .insert(Node {
                id: "child".to_string(),
                states: states(&["State1"]),
                parents: vec!["ghost".to_string()],
                probabilities: vec![1.0],
            })
            .unwrap();
        assert!(matches!(
            network.validate(),
            Err(FormatError::DanglingParent { .. })
        ));
    }
}
