//! Coverage counting against a flat training table.
//!
//! The coverage count of a fusion row is the number of training records
//! whose values match the row's full parent assignment, after translating
//! state identifiers to raw values through a [`StateMap`]. Root rows have
//! no parent combination to count and are defined as coverage 0.

use std::collections::HashMap;
use std::io;

use crate::cpt::ParentAssignment;
use crate::error::{CptResult, FormatError};
use crate::fusion::FusionInput;
use crate::labels::StateMap;

/// An already-flattened training table: one record per historical
/// observation, one column per network variable.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    index: HashMap<String, usize>,
    records: Vec<Vec<String>>,
}

impl TrainingTable {
    /// Reads a training table from CSV.
    ///
    /// # Errors
    /// CSV errors from the underlying reader.
    pub fn from_reader<R: io::Read>(input: R) -> CptResult<Self> {
        let mut reader = csv::ReaderBuilder::new().from_reader(input);
        let headers = reader.headers().map_err(FormatError::from)?.clone();
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_string(), i))
            .collect();
        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(FormatError::from)?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(Self { index, records })
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the table has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Counts records matching every `(variable, state)` of `assignment`,
    /// with states translated through `labels`.
    ///
    /// The empty (root) assignment counts as 0; an assignment naming a
    /// variable the table has no column for matches nothing.
    #[must_use]
    pub fn count_matching(&self, assignment: &ParentAssignment, labels: &StateMap) -> u64 {
        if assignment.is_empty() {
            return 0;
        }
        let mut filters = Vec::with_capacity(assignment.len());
        for (variable, state) in assignment.iter() {
            let Some(&column) = self.index.get(variable) else {
                return 0;
            };
            filters.push((column, labels.raw_value(variable, state)));
        }
        self.records
            .iter()
            .filter(|record| {
                filters
                    .iter()
                    .all(|&(column, value)| record.get(column).map(String::as_str) == Some(value))
            })
            .count() as u64
    }
}

/// Fills the coverage column of `inputs` from `table`.
pub fn annotate(inputs: &mut [FusionInput], table: &TrainingTable, labels: &StateMap) {
    for input in inputs {
        input.coverage = table.count_matching(&input.assignment, labels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRAINING: &str = "\
road_type,speed_limit,collision_severity
1,30,3
1,30,2
1,60,3
2,30,1
";

    fn assignment(pairs: &[(&str, &str)]) -> ParentAssignment {
        ParentAssignment::new(
            pairs
                .iter()
                .map(|(p, s)| ((*p).to_string(), (*s).to_string()))
                .collect(),
        )
    }

    fn labels() -> StateMap {
        StateMap::from_json(
            r#"{
                "road_type": {"State1": "1", "State2": "2"},
                "speed_limit": {"State30": "30", "State60": "60"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn counts_matching_records() {
        let table = TrainingTable::from_reader(TRAINING.as_bytes()).unwrap();
        assert_eq!(table.len(), 4);
        let labels = labels();

        let one_parent = assignment(&[("road_type", "State1")]);
        assert_eq!(table.count_matching(&one_parent, &labels), 3);

        let two_parents = assignment(&[("road_type", "State1"), ("speed_limit", "State30")]);
        assert_eq!(table.count_matching(&two_parents, &labels), 2);

        let unseen = assignment(&[("road_type", "State2"), ("speed_limit", "State60")]);
        assert_eq!(table.count_matching(&unseen, &labels), 0);
    }

    #[test]
    fn root_assignment_counts_zero() {
        let table = TrainingTable::from_reader(TRAINING.as_bytes()).unwrap();
        assert_eq!(
            table.count_matching(&ParentAssignment::empty(), &labels()),
            0
        );
    }

    #[test]
    fn unknown_column_matches_nothing() {
        let table = TrainingTable::from_reader(TRAINING.as_bytes()).unwrap();
        let missing = assignment(&[("weather_conditions", "State1")]);
        assert_eq!(table.count_matching(&missing, &labels()), 0);
    }

    #[test]
    fn annotate_fills_coverage() {
        let table = TrainingTable::from_reader(TRAINING.as_bytes()).unwrap();
        let labels = labels();
        let mut inputs = vec![
            FusionInput {
                node: "collision_severity".to_string(),
                state: "State1".to_string(),
                assignment: assignment(&[("road_type", "State1")]),
                data_probability: Some(0.5),
                prior_probability: Some(0.5),
                coverage: 0,
            },
            FusionInput {
                node: "road_type".to_string(),
                state: "State1".to_string(),
                assignment: ParentAssignment::empty(),
                data_probability: Some(0.5),
                prior_probability: Some(0.5),
                coverage: 99,
            },
        ];
        annotate(&mut inputs, &table, &labels);
        assert_eq!(inputs[0].coverage, 3);
        assert_eq!(inputs[1].coverage, 0);
    }
}
