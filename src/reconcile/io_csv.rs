// Primitives for reading the reduction tables.

use std::io::Read;

use serde::Deserialize;
use transcription_consensus::{AlignedCandidates, CellKey, DropdownCandidates};

use crate::reconcile::io_common::{aligned_groups, parse_literal, parse_task, selection_groups};
use crate::reconcile::*;

#[derive(PartialEq, Debug, Clone, Deserialize)]
struct TextReductionRow {
    subject_id: u64,
    task: String,
    #[serde(rename = "data.aligned_text", default)]
    aligned_text: Option<String>,
    #[serde(rename = "data.number_views", default)]
    number_views: Option<f64>,
    #[serde(rename = "data.consensus_score", default)]
    consensus_score: Option<f64>,
    #[serde(rename = "data.consensus_text", default)]
    consensus_text: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Deserialize)]
struct DropdownReductionRow {
    subject_id: u64,
    task: String,
    #[serde(rename = "data.value", default)]
    value: Option<String>,
}

// The header is line 1.
fn lineno(idx: usize) -> usize {
    idx + 2
}

fn cell_key(subject_id: u64, task: &str, lineno: usize) -> ReconcileResult<CellKey> {
    let task = parse_task(task).context(BadTaskSnafu {
        lineno,
        value: task.to_string(),
    })?;
    Ok(CellKey::new(subject_id, task))
}

/// Reads the output of the text reducer.
pub fn read_text_reduction<R: Read>(
    rdr: R,
    source: &str,
) -> ReconcileResult<Vec<(CellKey, AlignedCandidates)>> {
    let mut csv_rdr = csv::Reader::from_reader(rdr);
    let mut res = Vec::new();
    for (idx, row_r) in csv_rdr.deserialize::<TextReductionRow>().enumerate() {
        let lineno = lineno(idx);
        let row = row_r.context(CsvLineParseSnafu { path: source, lineno })?;
        let key = cell_key(row.subject_id, &row.task, lineno)?;
        let aligned = match row.aligned_text.as_deref().map(str::trim) {
            None | Some("") => vec![],
            Some(text) => parse_literal(text)
                .and_then(|lit| aligned_groups(&lit))
                .map_err(|detail| ReconcileError::BadCell {
                    path: source.to_string(),
                    lineno,
                    column: "data.aligned_text".to_string(),
                    detail,
                })?,
        };
        let number_views = match row.number_views {
            None => None,
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Some(n as u32),
            Some(n) => {
                return BadCellSnafu {
                    path: source,
                    lineno,
                    column: "data.number_views",
                    detail: format!("{} is not a number of views", n),
                }
                .fail()
            }
        };
        res.push((
            key,
            AlignedCandidates {
                aligned,
                number_views,
                consensus_score: row.consensus_score,
                consensus_text: row.consensus_text,
            },
        ));
    }
    debug!("read_text_reduction: {}: {} cells", source, res.len());
    Ok(res)
}

/// Reads the output of the dropdown reducer.
pub fn read_dropdown_reduction<R: Read>(
    rdr: R,
    source: &str,
) -> ReconcileResult<Vec<(CellKey, DropdownCandidates)>> {
    let mut csv_rdr = csv::Reader::from_reader(rdr);
    let mut res = Vec::new();
    for (idx, row_r) in csv_rdr.deserialize::<DropdownReductionRow>().enumerate() {
        let lineno = lineno(idx);
        let row = row_r.context(CsvLineParseSnafu { path: source, lineno })?;
        let key = cell_key(row.subject_id, &row.task, lineno)?;
        let groups = match row.value.as_deref().map(str::trim) {
            None | Some("") => vec![],
            Some(text) => parse_literal(text)
                .and_then(|lit| selection_groups(&lit))
                .map_err(|detail| ReconcileError::BadCell {
                    path: source.to_string(),
                    lineno,
                    column: "data.value".to_string(),
                    detail,
                })?,
        };
        res.push((key, DropdownCandidates { groups }));
    }
    debug!("read_dropdown_reduction: {}: {} cells", source, res.len());
    Ok(res)
}
