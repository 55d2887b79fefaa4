//! # cptfuse - Coverage-weighted CPT fusion for discrete Bayesian networks
//!
//! cptfuse blends conditional probability tables (CPTs) learned from
//! historical collision data with an externally supplied (LLM) prior. It
//! parses a GeNIe XDSL network, expands each node's flat probability
//! array into rows, selects a probability source per row by comparing its
//! coverage count against a percentile threshold, renormalizes each
//! conditional-distribution slice, and writes the fused network back out
//! with everything but the probability payloads preserved verbatim.
//!
//! ## Core Concepts
//!
//! - **Network / Node**: the discrete network structure — ordered states,
//!   ordered parents, flat CPT array
//! - **Row**: one expanded CPT entry keyed by target state and parent
//!   assignment
//! - **Fusion**: per-row source selection plus per-slice renormalization
//! - **Combination order**: the declaration-order Cartesian enumeration
//!   that flat arrays are laid out in
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cptfuse::{BatchConfig, XdslDocument};
//!
//! let doc = XdslDocument::load("template.xdsl")?;
//! let inputs = cptfuse::table::read_fusion_inputs(std::fs::File::open("rows.csv")?)?;
//! for (p, result) in cptfuse::run_batch(&doc, &inputs, &BatchConfig::default()) {
//!     println!("P{p}: {:?}", result?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod coverage;
pub mod cpt;
pub mod error;
pub mod fusion;
pub mod labels;
pub mod network;
pub mod pipeline;
pub mod prior;
pub mod table;
pub mod writer;

// Re-export primary types at crate root for convenience
pub use coverage::TrainingTable;
pub use cpt::{collapse, expand, Collapsed, CptIndex, ParentAssignment, Row};
pub use error::{CptError, CptResult, DataCompletenessError, FormatError};
pub use fusion::{fuse, percentile, FusedRow, FusionInput, FusionOutcome, SourceChoice};
pub use labels::StateMap;
pub use network::xdsl::XdslDocument;
pub use network::{Network, Node};
pub use pipeline::{run_batch, run_percentile, BatchConfig, PercentileRun};
pub use prior::normalize_priors;
pub use writer::{update, UpdateReport};
