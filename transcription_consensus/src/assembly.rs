use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use log::{debug, info};

use crate::config::*;
use crate::uncertainty::{scan_transcriptionisms, Transcriptionism};

/// The resolved cells of one field.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct FieldColumn {
    pub name: String,
    pub cells: BTreeMap<CellKey, CellResolution>,
}

impl FieldColumn {
    pub fn new(name: &str) -> FieldColumn {
        FieldColumn {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }
}

// ********* Views ledger ***********

/// The views received by the cells of one row.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ViewsEntry {
    /// Field name to number of views.
    pub counts: BTreeMap<String, u32>,
    /// Every field that exists on this volume reached the retirement count.
    pub complete: bool,
}

/// Views and completeness of every row, carried from one run to the next.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ViewsLedger {
    entries: BTreeMap<CellKey, ViewsEntry>,
}

impl ViewsLedger {
    pub fn new() -> ViewsLedger {
        ViewsLedger::default()
    }

    pub fn insert(&mut self, key: CellKey, entry: ViewsEntry) {
        self.entries.insert(key, entry);
    }

    pub fn get(&self, key: &CellKey) -> Option<&ViewsEntry> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&CellKey, &ViewsEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries of the rows of one subject.
    pub fn subject(&self, subject_id: u64) -> impl Iterator<Item = (&CellKey, &ViewsEntry)> {
        self.entries
            .range(CellKey::new(subject_id, 0)..=CellKey::new(subject_id, u32::MAX))
    }

    /// Overrides this ledger with fresh entries, key by key.
    ///
    /// Entries already complete are kept. The other entries are replaced by the
    /// fresh ones, and keys seen for the first time are added. Counts are never
    /// combined.
    pub fn merge(&self, fresh: &ViewsLedger) -> ViewsLedger {
        let mut merged = self.clone();
        for (key, entry) in fresh.entries.iter() {
            match merged.entries.get(key) {
                Some(previous) if previous.complete => {}
                _ => {
                    merged.entries.insert(*key, entry.clone());
                }
            }
        }
        merged
    }

    /// A page is complete when the ledger holds at least `rows_per_page` rows for it
    /// and they are all complete.
    pub fn is_page_complete(&self, subject_id: u64, rows_per_page: usize) -> bool {
        let mut n = 0;
        for (_, entry) in self.subject(subject_id) {
            if !entry.complete {
                return false;
            }
            n += 1;
        }
        n >= rows_per_page
    }
}

// ********* Output rows ***********

/// What a reviewer has to look at in a row.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Problem {
    /// At least one field has no value.
    Blanks,
    /// The number of fields routed to manual review.
    Unresolved(usize),
    /// A resolved value still carries a marker.
    Transcriptionism(String),
    /// A resolved value is only zeros.
    ZeroValue(String),
}

impl Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Problem::Blanks => write!(f, "Blank(s)"),
            Problem::Unresolved(n) => write!(f, "{} unresolved", n),
            Problem::Transcriptionism(field) => write!(f, "Transcriptionism in {}", field),
            Problem::ZeroValue(field) => write!(f, "Zero in {}", field),
        }
    }
}

pub const LIST_SEPARATOR: &str = "; ";

#[derive(PartialEq, Debug, Clone)]
pub struct AssembledRow {
    pub key: CellKey,
    pub page: PageInfo,
    /// One value per field, in the order of the columns. `None` when the field has
    /// no cell for this key.
    pub values: Vec<Option<Resolution>>,
    /// The fields that were autoresolved, in the order of the columns.
    pub autoresolved: Vec<String>,
    pub problems: Vec<Problem>,
}

impl AssembledRow {
    pub fn rendered_values(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| v.as_ref().map(|r| r.render()).unwrap_or_default())
            .collect()
    }

    pub fn autoresolved_text(&self) -> String {
        self.autoresolved.join(LIST_SEPARATOR)
    }

    pub fn problems_text(&self) -> String {
        self.problems
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<String>>()
            .join(LIST_SEPARATOR)
    }
}

/// Statistics on the rows that were kept.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct AssemblySummary {
    pub rows: usize,
    pub pages: usize,
    pub dropped_pages: usize,
    pub dropped_rows: usize,
    /// Cells routed to manual review.
    pub unresolved: usize,
    /// Cells accepted without unanimity, including cleared exempt cells.
    pub autoresolved: usize,
    /// Rows with at least one blank field.
    pub blank_rows: usize,
    /// Cells rejected before the vote, per marker of doubt.
    pub uncertainty_rejections: BTreeMap<UncertaintyMarker, usize>,
    pub transcriptionism_rows: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AssembledTable {
    pub fields: Vec<String>,
    pub rows: Vec<AssembledRow>,
    /// The ledger to carry to the next run. It covers every row, including the
    /// rows of the pages that were dropped.
    pub ledger: ViewsLedger,
    pub summary: AssemblySummary,
}

/// Joins the resolved columns into one row per cell key.
///
/// All the keys of all the columns are kept: a field without a cell for a key
/// is `None` in that row. Every key must have page metadata.
pub fn assemble(
    columns: &[FieldColumn],
    pages: &BTreeMap<u64, PageInfo>,
    rules: &AssemblyRules,
    previous: Option<&ViewsLedger>,
) -> Result<AssembledTable, ConsensusError> {
    let keys: BTreeSet<CellKey> = columns
        .iter()
        .flat_map(|c| c.cells.keys().copied())
        .collect();
    debug!(
        "assemble: {} keys over {} columns",
        keys.len(),
        columns.len()
    );

    let mut rows: Vec<AssembledRow> = Vec::with_capacity(keys.len());
    let mut fresh = ViewsLedger::new();
    for key in keys {
        let page = pages
            .get(&key.subject_id)
            .ok_or(ConsensusError::MissingSubject(key.subject_id))?;
        let (row, entry) = assemble_row(key, page, columns, rules);
        fresh.insert(key, entry);
        rows.push(row);
    }

    let ledger = match previous {
        Some(p) => p.merge(&fresh),
        None => fresh,
    };

    let mut summary = AssemblySummary::default();
    let mut kept: Vec<AssembledRow> = Vec::with_capacity(rows.len());
    let mut page_status: BTreeMap<u64, bool> = BTreeMap::new();
    for row in rows {
        let sid = row.key.subject_id;
        let complete = *page_status
            .entry(sid)
            .or_insert_with(|| ledger.is_page_complete(sid, rules.rows_per_page));
        if complete || rules.include_unfinished {
            kept.push(row);
        } else {
            summary.dropped_rows += 1;
        }
    }
    for (sid, complete) in page_status.iter() {
        if !complete {
            if rules.include_unfinished {
                info!("assemble: keeping unfinished subject {}", sid);
            } else {
                info!("assemble: dropping unfinished subject {}", sid);
                summary.dropped_pages += 1;
            }
        }
    }

    kept.sort_by(|a, b| {
        (a.page.volume, a.page.page, a.key).cmp(&(b.page.volume, b.page.page, b.key))
    });

    // Only the rows that are kept contribute to the statistics.
    summary.rows = kept.len();
    summary.pages = kept
        .iter()
        .map(|r| r.key.subject_id)
        .collect::<BTreeSet<u64>>()
        .len();
    for row in kept.iter() {
        summary.autoresolved += row.autoresolved.len();
        for p in row.problems.iter() {
            match p {
                Problem::Blanks => summary.blank_rows += 1,
                Problem::Unresolved(n) => summary.unresolved += n,
                Problem::Transcriptionism(_) | Problem::ZeroValue(_) => {
                    summary.transcriptionism_rows += 1
                }
            }
        }
        for v in row.values.iter().flatten() {
            if let Resolution::Unresolved(Unresolved {
                reason: UnresolvedReason::Uncertain(marker),
                ..
            }) = v
            {
                *summary.uncertainty_rejections.entry(*marker).or_insert(0) += 1;
            }
        }
    }
    info!(
        "assemble: {} rows on {} pages kept, {} rows on {} pages dropped",
        summary.rows, summary.pages, summary.dropped_rows, summary.dropped_pages
    );

    Ok(AssembledTable {
        fields: columns.iter().map(|c| c.name.clone()).collect(),
        rows: kept,
        ledger,
        summary,
    })
}

fn assemble_row(
    key: CellKey,
    page: &PageInfo,
    columns: &[FieldColumn],
    rules: &AssemblyRules,
) -> (AssembledRow, ViewsEntry) {
    let mut values: Vec<Option<Resolution>> = Vec::with_capacity(columns.len());
    let mut autoresolved: Vec<String> = Vec::new();
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut has_blank = false;
    let mut num_unresolved = 0;
    let mut complete = true;

    for column in columns {
        let cell = column.cells.get(&key);
        let views = cell.map(|c| c.views).unwrap_or(0);
        counts.insert(column.name.clone(), views);
        let exempt = rules.is_exempt(&column.name, page.volume);

        let value = match cell {
            Some(c) if exempt && !c.resolution.is_blank() => {
                debug!(
                    "assemble_row: {}: clearing {:?} on volume {}",
                    key, column.name, page.volume
                );
                autoresolved.push(column.name.clone());
                Some(Resolution::Blank)
            }
            Some(c) => Some(c.resolution.clone()),
            None => None,
        };
        if !exempt {
            if views < rules.retirement_count {
                complete = false;
            }
            match &value {
                None | Some(Resolution::Blank) => has_blank = true,
                Some(Resolution::Unresolved(_)) => num_unresolved += 1,
                Some(r) if r.is_autoresolved() => autoresolved.push(column.name.clone()),
                Some(_) => {}
            }
        }
        values.push(value);
    }

    let mut problems: Vec<Problem> = Vec::new();
    if has_blank {
        problems.push(Problem::Blanks);
    }
    if num_unresolved > 0 {
        problems.push(Problem::Unresolved(num_unresolved));
    }
    if rules.transcriptionism_check {
        let resolved = columns.iter().zip(values.iter()).filter_map(|(c, v)| {
            v.as_ref()
                .and_then(|r| r.value())
                .map(|v| (c.name.as_str(), v))
        });
        match scan_transcriptionisms(resolved, &rules.zero_allowed) {
            Some((field, Transcriptionism::Marker)) => {
                problems.push(Problem::Transcriptionism(field))
            }
            Some((field, Transcriptionism::Zero)) => problems.push(Problem::ZeroValue(field)),
            None => {}
        }
    }

    let row = AssembledRow {
        key,
        page: page.clone(),
        values,
        autoresolved,
        problems,
    };
    (row, ViewsEntry { counts, complete })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn resolved(value: &str, autoresolved: bool, views: u32) -> CellResolution {
        CellResolution {
            resolution: Resolution::Resolved {
                value: value.to_string(),
                autoresolved,
            },
            views,
        }
    }

    fn pages(subjects: &[(u64, u32, i32)]) -> BTreeMap<u64, PageInfo> {
        subjects
            .iter()
            .map(|(sid, volume, page)| {
                (
                    *sid,
                    PageInfo {
                        volume: *volume,
                        page: *page,
                        location: format!("img_{}.jpg", sid),
                    },
                )
            })
            .collect()
    }

    fn small_pages(rows_per_page: usize) -> AssemblyRules {
        AssemblyRules {
            rows_per_page,
            ..AssemblyRules::default()
        }
    }

    #[test]
    fn outer_join_keeps_missing_cells() {
        init_logger();
        let mut name = FieldColumn::new("name");
        name.cells.insert(CellKey::new(1, 0), resolved("Smith", false, 3));
        name.cells.insert(CellKey::new(1, 1), resolved("Jones", false, 3));
        let mut age = FieldColumn::new("age");
        age.cells.insert(CellKey::new(1, 1), resolved("31", true, 3));

        // The first row has no view on "age": keep its unfinished page.
        let rules = AssemblyRules {
            include_unfinished: true,
            ..small_pages(2)
        };
        let t = assemble(&[name, age], &pages(&[(1, 2, 10)]), &rules, None).unwrap();
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0].values[1], None);
        assert_eq!(t.rows[0].problems, vec![Problem::Blanks]);
        assert_eq!(t.rows[1].autoresolved_text(), "age");
        assert!(t.rows[1].problems.is_empty());
        assert_eq!(t.summary.blank_rows, 1);
        assert_eq!(t.summary.autoresolved, 1);
    }

    #[test]
    fn exempt_field_is_cleared_and_not_blank() {
        let port = "port sailed out of";
        let mut name = FieldColumn::new("name");
        let mut p = FieldColumn::new(port);
        for sid in [1, 2] {
            name.cells.insert(CellKey::new(sid, 0), resolved("Smith", false, 3));
        }
        p.cells.insert(CellKey::new(1, 0), resolved("Deal", false, 3));
        let rules = AssemblyRules {
            rows_per_page: 1,
            exemptions: vec![Exemption {
                field: port.to_string(),
                volume: 1,
            }],
            ..AssemblyRules::default()
        };
        let t = assemble(&[name, p], &pages(&[(1, 1, 5), (2, 1, 6)]), &rules, None).unwrap();
        let row = &t.rows[0];
        assert_eq!(row.values[1], Some(Resolution::Blank));
        assert_eq!(row.autoresolved, vec![port.to_string()]);
        assert!(row.problems.is_empty());
        // No cell at all on the exempt field: still neither blank nor incomplete.
        let row = &t.rows[1];
        assert_eq!(row.key, CellKey::new(2, 0));
        assert!(row.problems.is_empty());
        assert!(t.ledger.get(&row.key).unwrap().complete);
    }

    #[test]
    fn incomplete_page_is_dropped_with_its_bookkeeping() {
        init_logger();
        let mut name = FieldColumn::new("name");
        for task in 0..25 {
            name.cells.insert(CellKey::new(1, task), resolved("Smith", true, 3));
            let views = if task == 7 { 2 } else { 3 };
            name.cells.insert(CellKey::new(2, task), resolved("Jones", true, views));
        }
        let columns = vec![name];
        let pages = pages(&[(1, 1, 1), (2, 1, 2)]);

        let t = assemble(&columns, &pages, &AssemblyRules::default(), None).unwrap();
        assert_eq!(t.rows.len(), 25);
        assert!(t.rows.iter().all(|r| r.key.subject_id == 1));
        assert_eq!(t.summary.autoresolved, 25);
        assert_eq!(t.summary.dropped_pages, 1);
        assert_eq!(t.summary.dropped_rows, 25);
        assert_eq!(t.ledger.len(), 50);
        assert!(!t.ledger.get(&CellKey::new(2, 7)).unwrap().complete);

        let rules = AssemblyRules {
            include_unfinished: true,
            ..AssemblyRules::default()
        };
        let t = assemble(&columns, &pages, &rules, None).unwrap();
        assert_eq!(t.rows.len(), 50);
        assert_eq!(t.summary.autoresolved, 50);
    }

    #[test]
    fn page_with_too_few_rows_is_incomplete() {
        let mut name = FieldColumn::new("name");
        name.cells.insert(CellKey::new(1, 0), resolved("Smith", false, 3));
        let t = assemble(&[name], &pages(&[(1, 1, 1)]), &small_pages(2), None).unwrap();
        assert!(t.rows.is_empty());
    }

    #[test]
    fn previous_ledger_completes_a_page() {
        init_logger();
        let mut previous = ViewsLedger::new();
        previous.insert(
            CellKey::new(1, 1),
            ViewsEntry {
                counts: BTreeMap::from([("name".to_string(), 3)]),
                complete: true,
            },
        );
        let mut name = FieldColumn::new("name");
        name.cells.insert(CellKey::new(1, 0), resolved("Smith", false, 3));
        let t = assemble(
            &[name],
            &pages(&[(1, 1, 1)]),
            &small_pages(2),
            Some(&previous),
        )
        .unwrap();
        assert_eq!(t.rows.len(), 1);
        assert_eq!(t.ledger.len(), 2);
    }

    #[test]
    fn merge_keeps_complete_entries_only() {
        let entry = |n: u32, complete: bool| ViewsEntry {
            counts: BTreeMap::from([("name".to_string(), n)]),
            complete,
        };
        let mut previous = ViewsLedger::new();
        previous.insert(CellKey::new(1, 0), entry(3, true));
        previous.insert(CellKey::new(1, 1), entry(1, false));
        let mut fresh = ViewsLedger::new();
        fresh.insert(CellKey::new(1, 0), entry(1, false));
        fresh.insert(CellKey::new(1, 1), entry(2, false));
        fresh.insert(CellKey::new(1, 2), entry(3, true));

        let merged = previous.merge(&fresh);
        assert_eq!(merged.get(&CellKey::new(1, 0)), Some(&entry(3, true)));
        assert_eq!(merged.get(&CellKey::new(1, 1)), Some(&entry(2, false)));
        assert_eq!(merged.get(&CellKey::new(1, 2)), Some(&entry(3, true)));
    }

    #[test]
    fn rows_are_ordered_by_volume_and_page() {
        let mut name = FieldColumn::new("name");
        for sid in [10, 20, 30] {
            name.cells.insert(CellKey::new(sid, 1), resolved("A", false, 3));
            name.cells.insert(CellKey::new(sid, 0), resolved("B", false, 3));
        }
        let pages = pages(&[(10, 2, 1), (20, 1, 9), (30, 1, 3)]);
        let t = assemble(&[name], &pages, &small_pages(2), None).unwrap();
        let order: Vec<(u64, u32)> = t
            .rows
            .iter()
            .map(|r| (r.key.subject_id, r.key.task))
            .collect();
        assert_eq!(order, vec![(30, 0), (30, 1), (20, 0), (20, 1), (10, 0), (10, 1)]);
    }

    #[test]
    fn missing_subject_is_fatal() {
        let mut name = FieldColumn::new("name");
        name.cells.insert(CellKey::new(5, 0), resolved("A", false, 3));
        assert_eq!(
            assemble(&[name], &pages(&[(1, 1, 1)]), &small_pages(1), None),
            Err(ConsensusError::MissingSubject(5))
        );
    }

    #[test]
    fn problems_are_listed_in_order() {
        let mut name = FieldColumn::new("name");
        let mut age = FieldColumn::new("age");
        let mut ship = FieldColumn::new("ship");
        let key = CellKey::new(1, 0);
        name.cells.insert(key, resolved("Sm?th", false, 3));
        age.cells.insert(
            key,
            CellResolution {
                resolution: Resolution::Unresolved(Unresolved {
                    reason: UnresolvedReason::Uncertain(UncertaintyMarker::QuestionMarks),
                    best_guess: None,
                    candidates: vec![("3?? @1".to_string(), 1)],
                }),
                views: 3,
            },
        );
        ship.cells.insert(
            key,
            CellResolution {
                resolution: Resolution::Blank,
                views: 3,
            },
        );
        let columns = [name, age, ship];
        let t = assemble(&columns, &pages(&[(1, 1, 1)]), &small_pages(1), None).unwrap();
        let row = &t.rows[0];
        assert_eq!(
            row.problems_text(),
            "Blank(s); 1 unresolved; Transcriptionism in name"
        );
        assert_eq!(t.summary.unresolved, 1);
        assert_eq!(t.summary.transcriptionism_rows, 1);
        assert_eq!(
            t.summary.uncertainty_rejections.get(&UncertaintyMarker::QuestionMarks),
            Some(&1)
        );
    }

    #[test]
    fn zero_values() {
        let mut age = FieldColumn::new("age");
        let mut wounds = FieldColumn::new("wounds");
        let key = CellKey::new(1, 0);
        age.cells.insert(key, resolved("00", false, 3));
        wounds.cells.insert(key, resolved("0", false, 3));
        let rules = AssemblyRules {
            rows_per_page: 1,
            zero_allowed: vec!["wounds".to_string()],
            ..AssemblyRules::default()
        };
        let t = assemble(&[age.clone(), wounds.clone()], &pages(&[(1, 1, 1)]), &rules, None)
            .unwrap();
        assert_eq!(t.rows[0].problems, vec![Problem::ZeroValue("age".to_string())]);
        let rules = AssemblyRules {
            transcriptionism_check: false,
            ..rules
        };
        let t = assemble(&[age, wounds], &pages(&[(1, 1, 1)]), &rules, None).unwrap();
        assert!(t.rows[0].problems.is_empty());
    }
}
