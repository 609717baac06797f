use std::collections::HashMap;

use log::{debug, warn};

use crate::config::{CellKey, ConsensusError};

/// The labels of a dropdown list in one version of a workflow: option code to
/// human-readable label.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<String, String>,
}

impl LabelTable {
    pub fn new() -> LabelTable {
        LabelTable::default()
    }

    pub fn from_pairs<I: IntoIterator<Item = (String, String)>>(pairs: I) -> LabelTable {
        LabelTable {
            labels: pairs.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, code: String, label: String) {
        if let Some(previous) = self.labels.insert(code.clone(), label) {
            warn!("insert: code {:?} was already labelled {:?}", code, previous);
        }
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.labels.get(code).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Replaces every label equal to `from` by `to`. Returns the number of labels
    /// rewritten.
    pub fn rewrite(&mut self, from: &str, to: &str) -> usize {
        let mut n = 0;
        for label in self.labels.values_mut() {
            if label == from {
                *label = to.to_string();
                n += 1;
            }
        }
        n
    }
}

/// Decodes the codes of one dropdown field, across all the versions of its
/// label table.
///
/// Codes are decoded after the vote: several codes may carry the same label,
/// and their votes are not merged.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DropdownDecoder {
    field: String,
    tables: Vec<LabelTable>,
}

impl DropdownDecoder {
    pub fn new(field: &str, tables: Vec<LabelTable>) -> DropdownDecoder {
        DropdownDecoder {
            field: field.to_string(),
            tables,
        }
    }

    /// The unique label of a code, voted at the cell `key`.
    ///
    /// The code must appear in at least one table, and all the tables where it
    /// appears must agree on the label.
    pub fn decode(&self, key: CellKey, code: &str) -> Result<String, ConsensusError> {
        let mut labels: Vec<&str> = Vec::new();
        for table in self.tables.iter() {
            if let Some(label) = table.get(code) {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
        }
        match labels.as_slice() {
            [] => Err(ConsensusError::UnknownCode {
                field: self.field.clone(),
                key,
                code: code.to_string(),
            }),
            [label] => {
                debug!("decode: {}: {:?} -> {:?}", self.field, code, label);
                Ok(label.to_string())
            }
            _ => Err(ConsensusError::AmbiguousCode {
                field: self.field.clone(),
                key,
                code: code.to_string(),
                labels: labels.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: CellKey = CellKey {
        subject_id: 1,
        task: 0,
    };

    fn table(pairs: &[(&str, &str)]) -> LabelTable {
        LabelTable::from_pairs(
            pairs
                .iter()
                .map(|(c, l)| (c.to_string(), l.to_string())),
        )
    }

    #[test]
    fn decode_is_stable() {
        let dec = DropdownDecoder::new("Ship", vec![table(&[("a1f", "To a Ship Cured")])]);
        let first = dec.decode(KEY, "a1f").unwrap();
        assert_eq!(first, "To a Ship Cured");
        assert_eq!(dec.decode(KEY, "a1f").unwrap(), first);
    }

    #[test]
    fn versions_that_agree_decode() {
        let dec = DropdownDecoder::new(
            "Ship",
            vec![
                table(&[("a1f", "Cured"), ("b2e", "Dead")]),
                table(&[("a1f", "Cured")]),
            ],
        );
        assert_eq!(dec.decode(KEY, "a1f").unwrap(), "Cured");
        assert_eq!(dec.decode(KEY, "b2e").unwrap(), "Dead");
    }

    #[test]
    fn unknown_and_ambiguous_codes() {
        let dec = DropdownDecoder::new(
            "Ship",
            vec![table(&[("a1f", "Cured")]), table(&[("a1f", "Dead")])],
        );
        assert_eq!(
            dec.decode(KEY, "zzz"),
            Err(ConsensusError::UnknownCode {
                field: "Ship".to_string(),
                key: KEY,
                code: "zzz".to_string()
            })
        );
        match dec.decode(KEY, "a1f") {
            Err(ConsensusError::AmbiguousCode { key, labels, .. }) => {
                assert_eq!(key, KEY);
                assert_eq!(labels, vec!["Cured".to_string(), "Dead".to_string()])
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn rewrite_makes_versions_agree() {
        let mut old = table(&[("a1f", "To a Ship Cured")]);
        let new = table(&[("a1f", "To a/his Ship Cured")]);
        assert_eq!(old.rewrite("To a Ship Cured", "To a/his Ship Cured"), 1);
        let dec = DropdownDecoder::new("Ship", vec![old, new]);
        assert_eq!(dec.decode(KEY, "a1f").unwrap(), "To a/his Ship Cured");
    }
}
