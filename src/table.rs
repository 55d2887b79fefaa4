//! CSV row-table interchange.
//!
//! Expanded CPT rows and fusion inputs travel between pipeline stages as
//! CSV with the columns `Target_Node`, `Target_State`, `Probability`, one
//! `Parent_<id>` column per network variable (blank when the row's node
//! does not have that parent), and for fusion inputs additionally
//! `llm_probability_norm` and `n_samples`. Headers may carry a UTF-8 BOM;
//! it is stripped before matching.

use std::io;

use crate::cpt::{ParentAssignment, Row};
use crate::error::{CptResult, FormatError};
use crate::fusion::{FusedRow, FusionInput};
use crate::network::Network;

/// Target node id column.
pub const TARGET_NODE: &str = "Target_Node";
/// Target state id column.
pub const TARGET_STATE: &str = "Target_State";
/// Data-derived probability column.
pub const PROBABILITY: &str = "Probability";
/// Prefix of per-parent state columns.
pub const PARENT_PREFIX: &str = "Parent_";
/// Normalized external-prior column.
pub const PRIOR_PROBABILITY: &str = "llm_probability_norm";
/// Coverage-count column.
pub const N_SAMPLES: &str = "n_samples";
/// Selected raw value column of a fused table.
pub const FUSED_RAW: &str = "p_fused_raw";
/// Renormalized probability column of a fused table.
pub const FUSED_NORM: &str = "p_fused_norm";

/// The `Parent_*` column ids for a network: every node id, sorted.
#[must_use]
pub fn parent_columns(network: &Network) -> Vec<String> {
    let mut ids: Vec<String> = network.nodes().map(|n| n.id.clone()).collect();
    ids.sort();
    ids
}

/// Writes expanded CPT rows as CSV.
///
/// # Errors
/// CSV or I/O errors from the underlying writer.
pub fn write_rows<W: io::Write>(out: W, rows: &[Row], parent_ids: &[String]) -> CptResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec![
        TARGET_NODE.to_string(),
        TARGET_STATE.to_string(),
        PROBABILITY.to_string(),
    ];
    header.extend(parent_ids.iter().map(|id| format!("{PARENT_PREFIX}{id}")));
    writer.write_record(&header).map_err(FormatError::from)?;
    for row in rows {
        let mut record = vec![
            row.node.clone(),
            row.state.clone(),
            format!("{:.10}", row.probability),
        ];
        for id in parent_ids {
            record.push(row.assignment.get(id).unwrap_or("").to_string());
        }
        writer.write_record(&record).map_err(FormatError::from)?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads expanded CPT rows from CSV.
///
/// # Errors
/// `MissingColumn` for an incomplete header, `MalformedRow` or
/// `InvalidProbability` for bad cells.
pub fn read_rows<R: io::Read>(input: R) -> CptResult<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new().from_reader(input);
    let header = Header::parse(&mut reader, &[])?;
    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(FormatError::from)?;
        let line = line as u64 + 2; // header is line 1
        let node = header.field(&record, header.node, line)?;
        let state = header.field(&record, header.state, line)?;
        let probability = parse_probability(&header.field(&record, header.probability, line)?, &node)?
            .ok_or(FormatError::MalformedRow {
                line,
                message: "empty Probability cell".to_string(),
            })?;
        rows.push(Row {
            node,
            state,
            assignment: header.assignment(&record),
            probability,
        });
    }
    Ok(rows)
}

/// Reads fusion-input rows from CSV.
///
/// Empty probability cells become `None` (fusion errors later only if the
/// absent source is actually selected). Coverage cells must be
/// non-negative integers; negative values are rejected, never coerced.
///
/// # Errors
/// `MissingColumn`, `MalformedRow`, `InvalidProbability`, or
/// `NegativeCoverage`.
pub fn read_fusion_inputs<R: io::Read>(input: R) -> CptResult<Vec<FusionInput>> {
    let mut reader = csv::ReaderBuilder::new().from_reader(input);
    let header = Header::parse(&mut reader, &[PRIOR_PROBABILITY, N_SAMPLES])?;
    let prior_col = header.extra[0];
    let samples_col = header.extra[1];

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(FormatError::from)?;
        let line = line as u64 + 2;
        let node = header.field(&record, header.node, line)?;
        let state = header.field(&record, header.state, line)?;
        let data_probability =
            parse_probability(&header.field(&record, header.probability, line)?, &node)?;
        let prior_probability =
            parse_probability(&header.field(&record, prior_col, line)?, &node)?;
        let coverage = parse_coverage(&header.field(&record, samples_col, line)?, &node, line)?;
        rows.push(FusionInput {
            node,
            state,
            assignment: header.assignment(&record),
            data_probability,
            prior_probability,
            coverage,
        });
    }
    Ok(rows)
}

/// Writes a fused table as CSV, one record per fused row.
///
/// # Errors
/// CSV or I/O errors from the underlying writer.
pub fn write_fused<W: io::Write>(
    out: W,
    rows: &[FusedRow],
    parent_ids: &[String],
) -> CptResult<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec![TARGET_NODE.to_string(), TARGET_STATE.to_string()];
    header.extend(parent_ids.iter().map(|id| format!("{PARENT_PREFIX}{id}")));
    header.push(FUSED_RAW.to_string());
    header.push(FUSED_NORM.to_string());
    writer.write_record(&header).map_err(FormatError::from)?;
    for row in rows {
        let mut record = vec![row.node.clone(), row.state.clone()];
        for id in parent_ids {
            record.push(row.assignment.get(id).unwrap_or("").to_string());
        }
        record.push(format!("{:.10}", row.raw));
        record.push(format!("{:.10}", row.fused));
        writer.write_record(&record).map_err(FormatError::from)?;
    }
    writer.flush()?;
    Ok(())
}

struct Header {
    node: usize,
    state: usize,
    probability: usize,
    parents: Vec<(usize, String)>,
    extra: Vec<usize>,
}

impl Header {
    fn parse<R: io::Read>(
        reader: &mut csv::Reader<R>,
        extra_columns: &[&str],
    ) -> Result<Self, FormatError> {
        let headers = reader.headers()?.clone();
        let names: Vec<&str> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}'))
            .collect();
        let find = |column: &str| {
            names
                .iter()
                .position(|h| *h == column)
                .ok_or_else(|| FormatError::MissingColumn {
                    column: column.to_string(),
                })
        };
        let parents = names
            .iter()
            .enumerate()
            .filter_map(|(i, h)| h.strip_prefix(PARENT_PREFIX).map(|p| (i, p.to_string())))
            .collect();
        let extra = extra_columns
            .iter()
            .map(|&c| find(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            node: find(TARGET_NODE)?,
            state: find(TARGET_STATE)?,
            probability: find(PROBABILITY)?,
            parents,
            extra,
        })
    }

    fn field(
        &self,
        record: &csv::StringRecord,
        column: usize,
        line: u64,
    ) -> Result<String, FormatError> {
        record
            .get(column)
            .map(|v| v.trim().to_string())
            .ok_or(FormatError::MalformedRow {
                line,
                message: format!("missing field {column}"),
            })
    }

    fn assignment(&self, record: &csv::StringRecord) -> ParentAssignment {
        let pairs = self
            .parents
            .iter()
            .filter_map(|(i, parent)| {
                let value = record.get(*i).unwrap_or("").trim();
                if value.is_empty() {
                    None
                } else {
                    Some((parent.clone(), value.to_string()))
                }
            })
            .collect();
        ParentAssignment::new(pairs)
    }
}

fn parse_probability(raw: &str, node: &str) -> Result<Option<f64>, FormatError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| FormatError::InvalidProbability {
            node: node.to_string(),
            value: raw.to_string(),
        })
}

fn parse_coverage(raw: &str, node: &str, line: u64) -> Result<u64, FormatError> {
    let value: f64 = raw.parse().map_err(|_| FormatError::MalformedRow {
        line,
        message: format!("invalid {N_SAMPLES} value '{raw}'"),
    })?;
    if value < 0.0 {
        return Err(FormatError::NegativeCoverage {
            node: node.to_string(),
            value,
        });
    }
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(FormatError::MalformedRow {
            line,
            message: format!("non-integer {N_SAMPLES} value '{raw}'"),
        });
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpt::expand;
    use crate::network::Node;

    fn network() -> Network {
        let mut network = Network::new();
        network
            .insert(Node::root(
                "road_type",
                vec!["State1".to_string(), "State2".to_string()],
                vec![0.3, 0.7],
            ))
            .unwrap();
        network
            .insert(Node {
                id: "collision_severity".to_string(),
                states: vec!["State1".to_string(), "State2".to_string()],
                parents: vec!["road_type".to_string()],
                probabilities: vec![0.2, 0.8, 0.6, 0.4],
            })
            .unwrap();
        network
    }

    #[test]
    fn rows_round_trip_through_csv() {
        let network = network();
        let columns = parent_columns(&network);
        let mut rows = Vec::new();
        for node in network.nodes() {
            rows.extend(expand(node, &network).unwrap());
        }

        let mut out = Vec::new();
        write_rows(&mut out, &rows, &columns).unwrap();
        let parsed = read_rows(out.as_slice()).unwrap();

        assert_eq!(parsed.len(), rows.len());
        for (a, b) in rows.iter().zip(&parsed) {
            assert_eq!(a.node, b.node);
            assert_eq!(a.state, b.state);
            assert_eq!(a.assignment, b.assignment);
            assert!((a.probability - b.probability).abs() < 1e-10);
        }
    }

    #[test]
    fn parent_columns_are_sorted_node_ids() {
        assert_eq!(
            parent_columns(&network()),
            vec!["collision_severity".to_string(), "road_type".to_string()]
        );
    }

    #[test]
    fn header_bom_is_stripped() {
        let csv = "\u{feff}Target_Node,Target_State,Probability\nA,s1,0.5\n";
        let rows = read_rows(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].node, "A");
    }

    #[test]
    fn missing_column_is_reported() {
        let csv = "Target_Node,Probability\nA,0.5\n";
        let err = read_rows(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains(TARGET_STATE));
    }

    #[test]
    fn fusion_inputs_parse_blank_cells_as_missing() {
        let csv = "Target_Node,Target_State,Probability,Parent_road_type,llm_probability_norm,n_samples\n\
                   collision_severity,State1,0.2,State1,,14\n\
                   collision_severity,State2,,State1,0.8,14\n";
        let inputs = read_fusion_inputs(csv.as_bytes()).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].prior_probability, None);
        assert_eq!(inputs[0].data_probability, Some(0.2));
        assert_eq!(inputs[0].coverage, 14);
        assert_eq!(inputs[1].data_probability, None);
        assert_eq!(
            inputs[1].assignment.get("road_type"),
            Some("State1")
        );
    }

    #[test]
    fn negative_coverage_is_rejected() {
        let csv = "Target_Node,Target_State,Probability,llm_probability_norm,n_samples\n\
                   A,s1,0.5,0.5,-3\n";
        let err = read_fusion_inputs(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Negative coverage"));
    }

    #[test]
    fn non_numeric_coverage_is_rejected() {
        let csv = "Target_Node,Target_State,Probability,llm_probability_norm,n_samples\n\
                   A,s1,0.5,0.5,lots\n";
        let err = read_fusion_inputs(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("n_samples"));
    }

    #[test]
    fn fused_table_includes_raw_and_norm_columns() {
        use crate::fusion::{FusedRow, SourceChoice};

        let rows = vec![FusedRow {
            node: "road_type".to_string(),
            state: "State1".to_string(),
            assignment: ParentAssignment::empty(),
            source: SourceChoice::ExternalPrior,
            raw: 0.6,
            fused: 0.6,
        }];
        let mut out = Vec::new();
        write_fused(&mut out, &rows, &parent_columns(&network())).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.contains(FUSED_RAW));
        assert!(header.contains(FUSED_NORM));
        assert!(header.contains("Parent_road_type"));
        assert!(lines.next().unwrap().contains("0.6000000000"));
    }
}
