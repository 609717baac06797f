//! Resolvers for each kind of field.
//!
//! Each resolver turns the candidates of one cell into a [Resolution]. Disagreement
//! and unreadable transcriptions produce [Resolution::Unresolved]; only candidates
//! that break the shape guaranteed by the reducer are errors.

use std::sync::OnceLock;

use chrono::NaiveDate;
use log::debug;
use regex::Regex;

use crate::config::*;
use crate::labels::DropdownDecoder;
use crate::tally::{resolve_category, CategoryOutcome, VoteTally};
use crate::uncertainty::detect_uncertainty_in;

/// The output format of resolved dates.
pub const DATE_FORMAT: &str = "%b %d %Y";

/// The label shown for an abstention in an unresolved dropdown cell.
pub const NONE_LABEL: &str = "<None>";

/// A field of the workflow.
#[derive(PartialEq, Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Only used by dropdown fields. Without labels, dropdown codes are written as-is.
    pub labels: Option<DropdownDecoder>,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            kind,
            labels: None,
        }
    }

    pub fn with_labels(self, labels: DropdownDecoder) -> FieldSpec {
        FieldSpec {
            labels: Some(labels),
            ..self
        }
    }
}

/// Resolves one cell of a field, dispatching on the kind of the field.
pub fn resolve_cell(
    field: &FieldSpec,
    key: CellKey,
    candidates: &Candidates,
    rules: &ResolutionRules,
) -> Result<CellResolution, ConsensusError> {
    let aligned = |resolution: Resolution, c: &AlignedCandidates| CellResolution {
        resolution,
        views: c.number_views.unwrap_or(0),
    };
    let res = match (field.kind, candidates) {
        (FieldKind::Dropdown, Candidates::Dropdown(c)) => resolve_dropdown(field, key, c, rules)?,
        (FieldKind::Text, Candidates::Aligned(c)) => aligned(resolve_text(c, rules), c),
        (FieldKind::Number, Candidates::Aligned(c)) => aligned(resolve_number(c, rules), c),
        (FieldKind::Date, Candidates::Aligned(c)) => aligned(resolve_date(c, rules), c),
        (FieldKind::CompoundNumber, Candidates::Aligned(c)) => {
            aligned(resolve_compound(c, rules), c)
        }
        (kind, _) => {
            return Err(ConsensusError::MalformedCandidates {
                field: field.name.clone(),
                key,
                detail: format!("candidates do not match a {:?} field", kind),
            })
        }
    };
    match &res.resolution {
        Resolution::Resolved {
            value,
            autoresolved: true,
        } => debug!("{}: {}: autoresolved to {:?}", field.name, key, value),
        Resolution::Unresolved(u) => debug!("{}: {}: unresolved: {}", field.name, key, u.reason),
        _ => {}
    }
    Ok(res)
}

// ********* Free text ***********

/// Resolves free text on the consensus score of the aligner.
///
/// The text is accepted when `consensus_score / number_views` reaches the text
/// threshold. It is autoresolved unless every view agreed.
pub fn resolve_text(c: &AlignedCandidates, rules: &ResolutionRules) -> Resolution {
    let views = match c.number_views {
        None | Some(0) => return Resolution::Blank,
        Some(n) => n,
    };
    let transcriptions = reconstitute_views(&c.aligned, " ");
    let best_guess = c
        .consensus_text
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let unresolved = |reason| {
        Resolution::Unresolved(Unresolved {
            reason,
            best_guess: best_guess.clone(),
            candidates: VoteTally::count(transcriptions.iter().cloned())
                .entries()
                .to_vec(),
        })
    };

    if rules.uncertainty_check {
        if let Some(marker) = detect_uncertainty_in(transcriptions.iter().map(|s| s.as_str())) {
            return unresolved(UnresolvedReason::Uncertain(marker));
        }
    }
    let score = match c.consensus_score {
        Some(s) => s,
        None => return unresolved(UnresolvedReason::LowConsensus),
    };
    if !rules.text_threshold.is_reached(score, views as f64) {
        debug!(
            "resolve_text: score {} over {} views is below {}",
            score,
            views,
            rules.text_threshold.value()
        );
        return unresolved(UnresolvedReason::LowConsensus);
    }
    match best_guess {
        None => Resolution::Blank,
        Some(value) => Resolution::Resolved {
            value,
            autoresolved: (score - views as f64).abs() > f64::EPSILON,
        },
    }
}

/// Rebuilds the transcription of each view from the aligned groups.
///
/// Group `g` holds at index `i` the part of view `i` at this position. Empty parts
/// are skipped, and views that end up empty are dropped.
pub fn reconstitute_views(aligned: &[Vec<String>], joiner: &str) -> Vec<String> {
    let width = aligned.iter().map(|g| g.len()).max().unwrap_or(0);
    (0..width)
        .map(|i| {
            aligned
                .iter()
                .filter_map(|g| g.get(i))
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect::<Vec<&str>>()
                .join(joiner)
        })
        .filter(|s| !s.is_empty())
        .collect()
}

// ********* Normalise then vote ***********

/// The non-empty values of a cell whose candidates form a single group.
enum SingleGroup<'a> {
    Values(Vec<&'a str>),
    Blank,
    Rejected(Resolution),
}

fn single_group<'a>(c: &'a AlignedCandidates, rules: &ResolutionRules) -> SingleGroup<'a> {
    if matches!(c.number_views, None | Some(0)) {
        return SingleGroup::Blank;
    }
    if c.aligned.len() != 1 {
        let raw: Vec<&str> = c
            .aligned
            .iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if raw.is_empty() {
            return SingleGroup::Blank;
        }
        return SingleGroup::Rejected(unresolved_raw(UnresolvedReason::Shape, &raw));
    }
    let values: Vec<&str> = c.aligned[0]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if values.is_empty() {
        return SingleGroup::Blank;
    }
    if rules.uncertainty_check {
        if let Some(marker) = detect_uncertainty_in(values.iter().copied()) {
            return SingleGroup::Rejected(unresolved_raw(
                UnresolvedReason::Uncertain(marker),
                &values,
            ));
        }
    }
    SingleGroup::Values(values)
}

fn unresolved_raw(reason: UnresolvedReason, raw: &[&str]) -> Resolution {
    Resolution::Unresolved(Unresolved {
        reason,
        best_guess: None,
        candidates: VoteTally::count(raw.iter().map(|s| s.to_string()))
            .entries()
            .to_vec(),
    })
}

fn vote<L: PartialEq>(
    tally: &VoteTally<L>,
    rules: &ResolutionRules,
    raw: &[&str],
    render: impl Fn(&L) -> String,
) -> Resolution {
    match resolve_category(tally, rules.vote_threshold) {
        CategoryOutcome::Winner(w) => Resolution::Resolved {
            value: render(w.label),
            autoresolved: !w.unanimous,
        },
        CategoryOutcome::NoConsensus(_) => unresolved_raw(UnresolvedReason::NoMajority, raw),
    }
}

/// Resolves an integer: every value must read as a whole number.
pub fn resolve_number(c: &AlignedCandidates, rules: &ResolutionRules) -> Resolution {
    let values = match single_group(c, rules) {
        SingleGroup::Values(v) => v,
        SingleGroup::Blank => return Resolution::Blank,
        SingleGroup::Rejected(r) => return r,
    };
    let mut numbers: Vec<i64> = Vec::with_capacity(values.len());
    for v in values.iter() {
        match v.parse::<f64>() {
            Err(_) => return unresolved_raw(UnresolvedReason::NotANumber, &values),
            Ok(x) if !x.is_finite() || x.fract() != 0.0 => {
                return unresolved_raw(UnresolvedReason::NotIntegral, &values)
            }
            // Outside [-2^63, 2^63) the cast saturates.
            Ok(x) if x < i64::MIN as f64 || x >= i64::MAX as f64 => {
                return unresolved_raw(UnresolvedReason::OutOfRange, &values)
            }
            Ok(x) => numbers.push(x as i64),
        }
    }
    vote(&VoteTally::count(numbers), rules, &values, |n| n.to_string())
}

fn date_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r"^(\d+)[-/. ](\d+)[-/. ](\d+)$").expect("date regex must compile")
    })
}

/// Reads a day-first date.
///
/// A zero in any component is a sign of a damaged source and is always rejected,
/// before the calendar is consulted. Years must be written in full.
pub fn parse_date(value: &str) -> Result<NaiveDate, UnresolvedReason> {
    let caps = date_shape()
        .captures(value)
        .ok_or(UnresolvedReason::DateShape)?;
    let mut parts = [0u32; 3];
    for (i, part) in parts.iter_mut().enumerate() {
        let digits = &caps[i + 1];
        if digits.chars().all(|c| c == '0') {
            return Err(UnresolvedReason::ZeroDateComponent);
        }
        *part = digits
            .parse::<u32>()
            .map_err(|_| UnresolvedReason::InvalidDate)?;
    }
    let [day, month, year] = parts;
    if year < 1000 {
        return Err(UnresolvedReason::InvalidDate);
    }
    NaiveDate::from_ymd_opt(year as i32, month, day).ok_or(UnresolvedReason::InvalidDate)
}

/// Resolves a day-first date. The vote is on calendar dates, so different spellings
/// of the same date agree.
pub fn resolve_date(c: &AlignedCandidates, rules: &ResolutionRules) -> Resolution {
    let values = match single_group(c, rules) {
        SingleGroup::Values(v) => v,
        SingleGroup::Blank => return Resolution::Blank,
        SingleGroup::Rejected(r) => return r,
    };
    let mut dates: Vec<NaiveDate> = Vec::with_capacity(values.len());
    for v in values.iter() {
        match parse_date(v) {
            Ok(d) => dates.push(d),
            Err(reason) => {
                debug!("resolve_date: {:?}: {}", v, reason);
                return unresolved_raw(reason, &values);
            }
        }
    }
    vote(&VoteTally::count(dates), rules, &values, |d| {
        d.format(DATE_FORMAT).to_string()
    })
}

// ********* Compound numbers ***********

/// Resolves a number made of two parts, such as years at sea in two fleets.
///
/// Each view must hold exactly two parts. The parts are voted on independently
/// and the field is resolved only if both parts are.
pub fn resolve_compound(c: &AlignedCandidates, rules: &ResolutionRules) -> Resolution {
    if matches!(c.number_views, None | Some(0)) {
        return Resolution::Blank;
    }
    // The aligner works character by character on this field.
    let transcriptions = reconstitute_views(&c.aligned, "");
    if transcriptions.is_empty() {
        return Resolution::Blank;
    }
    let raw: Vec<&str> = transcriptions.iter().map(|s| s.as_str()).collect();
    if rules.uncertainty_check {
        if let Some(marker) = detect_uncertainty_in(raw.iter().copied()) {
            return unresolved_raw(UnresolvedReason::Uncertain(marker), &raw);
        }
    }

    let mut first: VoteTally<f64> = VoteTally::new();
    let mut second: VoteTally<f64> = VoteTally::new();
    for t in raw.iter() {
        let parts: Vec<&str> = t.split(rules.compound_delimiter).collect();
        if parts.len() != 2 {
            return unresolved_raw(UnresolvedReason::CompoundShape, &raw);
        }
        match (compound_part(parts[0]), compound_part(parts[1])) {
            (Some(a), Some(b)) => {
                first.add(a, 1);
                second.add(b, 1);
            }
            _ => return unresolved_raw(UnresolvedReason::NotANumber, &raw),
        }
    }

    match (
        resolve_category(&first, rules.vote_threshold),
        resolve_category(&second, rules.vote_threshold),
    ) {
        (CategoryOutcome::Winner(a), CategoryOutcome::Winner(b)) => Resolution::Resolved {
            value: format!("{}{}{}", a.label, rules.compound_delimiter, b.label),
            autoresolved: !(a.unanimous && b.unanimous),
        },
        _ => unresolved_raw(UnresolvedReason::NoMajority, &raw),
    }
}

fn compound_part(part: &str) -> Option<f64> {
    part.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

// ********* Dropdowns ***********

/// Resolves a dropdown on the raw codes, then decodes the winner.
pub fn resolve_dropdown(
    field: &FieldSpec,
    key: CellKey,
    c: &DropdownCandidates,
    rules: &ResolutionRules,
) -> Result<CellResolution, ConsensusError> {
    let group = match c.groups.as_slice() {
        [group] => group,
        _ => {
            return Err(ConsensusError::MalformedCandidates {
                field: field.name.clone(),
                key,
                detail: format!("expected one group of selections, found {}", c.groups.len()),
            })
        }
    };
    let tally = VoteTally::from_entries(group.clone());
    let total = tally.total();
    let views = total as u32;
    if total == 0 {
        return Ok(CellResolution {
            resolution: Resolution::Blank,
            views,
        });
    }
    let resolution = match resolve_category(&tally, rules.vote_threshold) {
        CategoryOutcome::Winner(w) => match w.label {
            None => Resolution::Blank,
            Some(code) => Resolution::Resolved {
                value: decode(field, key, code)?,
                autoresolved: !w.unanimous,
            },
        },
        CategoryOutcome::NoConsensus(t) => {
            let mut candidates: Vec<(String, u64)> = Vec::with_capacity(t.len());
            for (code, count) in t.entries() {
                let label = match code {
                    None => NONE_LABEL.to_string(),
                    Some(code) => decode(field, key, code)?,
                };
                candidates.push((label, *count));
            }
            Resolution::Unresolved(Unresolved {
                reason: UnresolvedReason::NoMajority,
                best_guess: None,
                candidates,
            })
        }
    };
    Ok(CellResolution { resolution, views })
}

fn decode(field: &FieldSpec, key: CellKey, code: &str) -> Result<String, ConsensusError> {
    match &field.labels {
        Some(decoder) => decoder.decode(key, code),
        None => Ok(code.to_string()),
    }
}
