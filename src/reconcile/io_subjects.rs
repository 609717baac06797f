use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;
use transcription_consensus::PageInfo;

use crate::reconcile::*;

#[derive(PartialEq, Debug, Clone, Deserialize)]
struct SubjectRow {
    subject_id: u64,
    volume: u32,
    page: i32,
    #[serde(default)]
    location: Option<String>,
}

/// Reads the volume, page and image location of each subject.
pub fn read_subjects<R: Read>(rdr: R, source: &str) -> ReconcileResult<BTreeMap<u64, PageInfo>> {
    let mut csv_rdr = csv::Reader::from_reader(rdr);
    let mut res: BTreeMap<u64, PageInfo> = BTreeMap::new();
    for (idx, row_r) in csv_rdr.deserialize::<SubjectRow>().enumerate() {
        let row = row_r.context(CsvLineParseSnafu {
            path: source,
            lineno: idx + 2,
        })?;
        let info = PageInfo {
            volume: row.volume,
            page: row.page,
            location: row.location.unwrap_or_default(),
        };
        if let Some(previous) = res.get(&row.subject_id) {
            if *previous != info {
                whatever!(
                    "{}: subject {} is listed twice with different pages: {:?} and {:?}",
                    source,
                    row.subject_id,
                    previous,
                    info
                );
            }
            continue;
        }
        res.insert(row.subject_id, info);
    }
    info!("read_subjects: {}: {} subjects", source, res.len());
    Ok(res)
}
