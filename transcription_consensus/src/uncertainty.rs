use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::config::UncertaintyMarker;

// The patterns are checked in this order. The first one that matches names the marker.
fn uncertainty_patterns() -> &'static [(UncertaintyMarker, Regex)] {
    static PATTERNS: OnceLock<Vec<(UncertaintyMarker, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (UncertaintyMarker::Brackets, r"\[[^\]]*\]"),
            (UncertaintyMarker::ParenthesisedQuestion, r"\(\s*\?\s*\)"),
            (UncertaintyMarker::QuestionMarks, r"\?{2,}"),
            (UncertaintyMarker::LeadingAbbreviation, r"^\D\."),
        ]
        .into_iter()
        .map(|(marker, pattern)| {
            (
                marker,
                Regex::new(pattern).expect("uncertainty regex must compile"),
            )
        })
        .collect()
    })
}

fn leftover_marker() -> &'static Regex {
    static LEFTOVER: OnceLock<Regex> = OnceLock::new();
    LEFTOVER.get_or_init(|| {
        Regex::new(r"[\[\]{}]|\.\.|\?").expect("transcriptionism regex must compile")
    })
}

/// Returns the first marker of doubt found in a transcription.
pub fn detect_uncertainty(transcription: &str) -> Option<UncertaintyMarker> {
    uncertainty_patterns()
        .iter()
        .find(|(_, re)| re.is_match(transcription))
        .map(|(marker, _)| *marker)
}

/// Returns the first marker of doubt found in any of the transcriptions of a cell.
pub fn detect_uncertainty_in<'a, I>(transcriptions: I) -> Option<UncertaintyMarker>
where
    I: IntoIterator<Item = &'a str>,
{
    for t in transcriptions {
        if let Some(marker) = detect_uncertainty(t) {
            debug!("detect_uncertainty_in: {:?} matches {}", t, marker);
            return Some(marker);
        }
    }
    None
}

/// A resolved value that still looks like an artefact of transcription.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Transcriptionism {
    /// Brackets, braces, a double period or a question mark.
    Marker,
    /// Only zeros, in a field where zero is not a value.
    Zero,
}

/// Scans the resolved values of a row.
///
/// `values` yields the field name and the resolved value of each cell. The first
/// field carrying a marker is reported; the zero check only runs when no field
/// carries a marker.
pub fn scan_transcriptionisms<'a, I>(
    values: I,
    zero_allowed: &[String],
) -> Option<(String, Transcriptionism)>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let values: Vec<(&str, &str)> = values.into_iter().collect();
    if let Some((field, _)) = values.iter().find(|(_, v)| leftover_marker().is_match(v)) {
        return Some((field.to_string(), Transcriptionism::Marker));
    }
    values
        .iter()
        .find(|(field, v)| is_all_zeros(v) && !zero_allowed.iter().any(|z| z == field))
        .map(|(field, _)| (field.to_string(), Transcriptionism::Zero))
}

fn is_all_zeros(value: &str) -> bool {
    let v = value.trim();
    !v.is_empty() && v.chars().all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_of_doubt() {
        assert_eq!(detect_uncertainty("[illegible]"), Some(UncertaintyMarker::Brackets));
        assert_eq!(detect_uncertainty("John [?] Smith"), Some(UncertaintyMarker::Brackets));
        assert_eq!(
            detect_uncertainty("Smith ( ? )"),
            Some(UncertaintyMarker::ParenthesisedQuestion)
        );
        assert_eq!(detect_uncertainty("Sm??h"), Some(UncertaintyMarker::QuestionMarks));
        assert_eq!(
            detect_uncertainty("J. Smith"),
            Some(UncertaintyMarker::LeadingAbbreviation)
        );
    }

    #[test]
    fn plain_transcriptions_pass() {
        for t in ["John Smith", "1. Smith", "Smith?", "", "St Ives", "12-03-1850"] {
            assert_eq!(detect_uncertainty(t), None, "{:?}", t);
        }
    }

    #[test]
    fn first_uncertain_transcription_is_reported() {
        let ts = vec!["Smith", "Sm??h", "[Smith]"];
        assert_eq!(
            detect_uncertainty_in(ts.iter().copied()),
            Some(UncertaintyMarker::QuestionMarks)
        );
    }

    #[test]
    fn marker_wins_over_zero() {
        let zero_allowed = vec!["Wounds".to_string()];
        let row = vec![("Age", "000"), ("Name", "Smith?")];
        assert_eq!(
            scan_transcriptionisms(row, &zero_allowed),
            Some(("Name".to_string(), Transcriptionism::Marker))
        );
    }

    #[test]
    fn zero_in_allowed_field_is_accepted() {
        let zero_allowed = vec!["Wounds".to_string()];
        let row = vec![("Wounds", "0"), ("Name", "Smith")];
        assert_eq!(scan_transcriptionisms(row, &zero_allowed), None);
        let row = vec![("Wounds", "0"), ("Age", "00")];
        assert_eq!(
            scan_transcriptionisms(row, &zero_allowed),
            Some(("Age".to_string(), Transcriptionism::Zero))
        );
    }

    #[test]
    fn double_period_and_braces() {
        assert_eq!(
            scan_transcriptionisms(vec![("Name", "Smi..th")], &[]).map(|x| x.1),
            Some(Transcriptionism::Marker)
        );
        assert_eq!(
            scan_transcriptionisms(vec![("Name", "{Smith}")], &[]).map(|x| x.1),
            Some(Transcriptionism::Marker)
        );
        assert_eq!(scan_transcriptionisms(vec![("Name", "J. Smith")], &[]), None);
    }
}
