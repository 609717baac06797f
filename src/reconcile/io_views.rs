// The views ledger: one row per cell key, the number of views of each field and
// whether the row is complete.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use transcription_consensus::{CellKey, ViewsEntry, ViewsLedger};

use crate::reconcile::io_common::parse_task;
use crate::reconcile::*;

const COMPLETE: &str = "complete";

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "true" | "True" | "TRUE" | "1" => Some(true),
        "false" | "False" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    i: usize,
    source: &str,
    column: &str,
) -> ReconcileResult<&'r str> {
    record.get(i).context(MissingColumnSnafu {
        path: source,
        column,
    })
}

/// Reads a ledger written by a previous run. The field columns are the ones of
/// the header; fields added since then have no count.
pub fn read_views<R: Read>(rdr: R, source: &str) -> ReconcileResult<ViewsLedger> {
    let mut csv_rdr = csv::Reader::from_reader(rdr);
    let headers = csv_rdr
        .headers()
        .context(CsvLineParseSnafu {
            path: source,
            lineno: 1usize,
        })?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .context(MissingColumnSnafu {
                path: source,
                column: name,
            })
    };
    let sid_idx = column("subject_id")?;
    let task_idx = column("task")?;
    let complete_idx = column(COMPLETE)?;
    let field_idxs: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != sid_idx && *i != task_idx && *i != complete_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut ledger = ViewsLedger::new();
    for (idx, record_r) in csv_rdr.records().enumerate() {
        let lineno = idx + 2;
        let record = record_r.context(CsvLineParseSnafu {
            path: source,
            lineno,
        })?;
        let bad = |column: &str, value: &str| ReconcileError::BadCell {
            path: source.to_string(),
            lineno,
            column: column.to_string(),
            detail: format!("cannot read {:?}", value),
        };

        let sid_s = field(&record, sid_idx, source, "subject_id")?;
        let subject_id = sid_s
            .trim()
            .parse::<u64>()
            .map_err(|_| bad("subject_id", sid_s))?;
        let task_s = field(&record, task_idx, source, "task")?;
        let task = parse_task(task_s).ok_or_else(|| bad("task", task_s))?;
        let complete_s = field(&record, complete_idx, source, COMPLETE)?;
        let complete = parse_bool(complete_s).ok_or_else(|| bad(COMPLETE, complete_s))?;

        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for (i, name) in field_idxs.iter() {
            let s = field(&record, *i, source, name)?.trim();
            if s.is_empty() {
                continue;
            }
            // Counts may have been written as floats.
            let n = s
                .parse::<f64>()
                .ok()
                .filter(|n| *n >= 0.0 && n.fract() == 0.0)
                .ok_or_else(|| bad(name.as_str(), s))?;
            counts.insert(name.clone(), n as u32);
        }
        ledger.insert(CellKey::new(subject_id, task), ViewsEntry { counts, complete });
    }
    info!("read_views: {}: {} rows", source, ledger.len());
    Ok(ledger)
}

/// Writes a ledger with one column per field, in the given order.
pub fn write_views<W: Write>(
    wtr: W,
    ledger: &ViewsLedger,
    fields: &[String],
) -> ReconcileResult<()> {
    let mut csv_wtr = csv::Writer::from_writer(wtr);
    let mut header: Vec<&str> = vec!["subject_id", "task"];
    header.extend(fields.iter().map(|s| s.as_str()));
    header.push(COMPLETE);
    csv_wtr.write_record(&header).context(CsvWriteSnafu {})?;
    for (key, entry) in ledger.entries() {
        let mut record: Vec<String> = vec![key.subject_id.to_string(), key.task.to_string()];
        for f in fields.iter() {
            record.push(entry.counts.get(f).map(|n| n.to_string()).unwrap_or_default());
        }
        record.push(entry.complete.to_string());
        csv_wtr.write_record(&record).context(CsvWriteSnafu {})?;
    }
    csv_wtr.flush().context(WritingSnafu { path: "views ledger" })?;
    Ok(())
}
