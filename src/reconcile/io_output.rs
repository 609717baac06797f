// The reconciled table, one row per subject and task.

use std::io::Write;

use transcription_consensus::AssembledTable;

use crate::reconcile::*;

const LEADING_COLUMNS: [&str; 5] = ["subject_id", "task", "volume", "page", "location"];
const AUTORESOLVED: &str = "Autoresolved";
const PROBLEMS: &str = "Problems";

/// The header of the reconciled table.
pub fn table_header(table: &AssembledTable) -> Vec<String> {
    let mut header: Vec<String> = LEADING_COLUMNS.iter().map(|s| s.to_string()).collect();
    header.extend(table.fields.iter().cloned());
    header.push(AUTORESOLVED.to_string());
    header.push(PROBLEMS.to_string());
    header
}

pub fn write_table<W: Write>(wtr: W, table: &AssembledTable) -> ReconcileResult<()> {
    let mut csv_wtr = csv::Writer::from_writer(wtr);
    csv_wtr
        .write_record(&table_header(table))
        .context(CsvWriteSnafu {})?;
    for row in table.rows.iter() {
        let mut record: Vec<String> = vec![
            row.key.subject_id.to_string(),
            row.key.task.to_string(),
            row.page.volume.to_string(),
            row.page.page.to_string(),
            row.page.location.clone(),
        ];
        record.extend(row.rendered_values());
        record.push(row.autoresolved_text());
        record.push(row.problems_text());
        csv_wtr.write_record(&record).context(CsvWriteSnafu {})?;
    }
    csv_wtr
        .flush()
        .context(WritingSnafu { path: "reconciled table" })?;
    debug!("write_table: {} rows", table.rows.len());
    Ok(())
}

/// Renders the table in memory.
pub fn render_table(table: &AssembledTable) -> ReconcileResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    write_table(&mut buf, table)?;
    match String::from_utf8(buf) {
        Ok(s) => Ok(s),
        Err(e) => whatever!("the reconciled table is not valid UTF-8: {}", e),
    }
}
