//! State-label configuration.
//!
//! Training tables store raw coded values (`1`, `30`, `GoingAhead`) while
//! network files use state identifiers (`State1`, `State30`). A
//! [`StateMap`] translates between the two. It is plain configuration
//! data supplied at construction time — nothing in the expansion or
//! fusion core depends on any particular labeling policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;

/// Immutable per-variable mapping from state identifier to raw value.
///
/// Loaded once (typically from JSON) and passed by reference wherever a
/// translation is needed. A variable or state with no mapping falls back
/// to the identifier itself, so identity-labeled variables need no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateMap {
    variables: HashMap<String, HashMap<String, String>>,
}

impl StateMap {
    /// Builds a state map from per-variable tables.
    #[must_use]
    pub fn new(variables: HashMap<String, HashMap<String, String>>) -> Self {
        Self { variables }
    }

    /// The empty map: every state translates to itself.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a state map from JSON text of the shape
    /// `{"variable": {"StateX": "raw value", ...}, ...}`.
    ///
    /// # Errors
    /// `Config` on malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, FormatError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The raw training-table value for `state` of `variable`, falling
    /// back to the state identifier itself when unmapped.
    #[must_use]
    pub fn raw_value<'a>(&'a self, variable: &str, state: &'a str) -> &'a str {
        self.variables
            .get(variable)
            .and_then(|states| states.get(state))
            .map_or(state, String::as_str)
    }

    /// Number of mapped variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True if no variable is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}
