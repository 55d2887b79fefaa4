//! Error types for cptfuse.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific error conditions and provides clear error messages
//! that name the offending node or row.

use thiserror::Error;

use crate::fusion::SourceChoice;

/// Malformed or structurally inconsistent network definitions and row tables.
///
/// A `FormatError` is fatal for the file being processed but does not
/// corrupt other files or other percentile runs.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Node '{node}' has no states")]
    MissingStates {
        node: String,
    },

    #[error("Node '{node}' has {actual} probabilities, expected {expected}")]
    ArrayLengthMismatch {
        node: String,
        expected: usize,
        actual: usize,
    },

    #[error("Node '{node}' references unknown parent '{parent}'")]
    DanglingParent {
        node: String,
        parent: String,
    },

    #[error("Duplicate node id '{node}'")]
    DuplicateNode {
        node: String,
    },

    #[error("Node '{node}': invalid probability value '{value}'")]
    InvalidProbability {
        node: String,
        value: String,
    },

    #[error("Rows reference node '{node}' which is not in the network")]
    UnknownNode {
        node: String,
    },

    #[error("Negative coverage count {value} for node '{node}'")]
    NegativeCoverage {
        node: String,
        value: f64,
    },

    #[error("Element '{element}' is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: String,
    },

    #[error("Required column '{column}' is missing from the table header")]
    MissingColumn {
        column: String,
    },

    #[error("Malformed table row {line}: {message}")]
    MalformedRow {
        line: u64,
        message: String,
    },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

/// A fusion row's selected probability source has no value.
///
/// This is fatal for the fusion run: substituting zero or skipping the row
/// would corrupt the renormalization of its conditional-distribution slice.
/// It is deliberately distinct from the uniform fallback applied during
/// collapse, which handles combinations absent from a fused table.
#[derive(Debug, Error)]
pub enum DataCompletenessError {
    #[error(
        "Row ({node}, {state} | {assignment}) selected the {selected} source but no value is present"
    )]
    MissingSourceValue {
        node: String,
        state: String,
        assignment: String,
        // Not named `source`: thiserror reserves that name for an error cause.
        selected: SourceChoice,
    },

    #[error("Cannot compute a percentile threshold over an empty coverage column")]
    EmptyCoverage,
}

/// Top-level error type for cptfuse.
#[derive(Debug, Error)]
pub enum CptError {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Data completeness error: {0}")]
    DataCompleteness(#[from] DataCompletenessError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CptError {
    /// Returns true if this is a format error.
    #[must_use]
    pub const fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }

    /// Returns true if this is a data-completeness error.
    #[must_use]
    pub const fn is_data_completeness(&self) -> bool {
        matches!(self, Self::DataCompleteness(_))
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Result type alias for cptfuse operations.
pub type CptResult<T> = Result<T, CptError>;
