// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The key of a cell: the subject (one scanned page) and the task (one of the
/// logical rows on that page).
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CellKey {
    pub subject_id: u64,
    pub task: u32,
}

impl CellKey {
    pub fn new(subject_id: u64, task: u32) -> CellKey {
        CellKey { subject_id, task }
    }
}

impl Display for CellKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subject {} task {}", self.subject_id, self.task)
    }
}

/// The kind of a field, which selects the resolver applied to its candidates.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum FieldKind {
    /// Free text, accepted on the consensus score computed by the aligner.
    Text,
    /// A selection in a dropdown list. The votes are cast on internal codes.
    Dropdown,
    /// An integer, voted on after coercion.
    Number,
    /// A day-first date, voted on after parsing.
    Date,
    /// Two numbers separated by a delimiter, each part voted on independently.
    CompoundNumber,
}

/// The transcriptions of a text-like field for one cell, as produced by the
/// upstream aligner.
///
/// `aligned` holds one group per aligned position; each group holds one entry per
/// view. Entries may be empty when a view has nothing at this position.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct AlignedCandidates {
    pub aligned: Vec<Vec<String>>,
    pub number_views: Option<u32>,
    pub consensus_score: Option<f64>,
    pub consensus_text: Option<String>,
}

/// The selections of a dropdown field for one cell.
///
/// Each group maps a code to its number of votes. A `None` code is an abstention.
/// The reducer always produces exactly one group.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct DropdownCandidates {
    pub groups: Vec<Vec<(Option<String>, u64)>>,
}

/// All the candidates submitted for one cell.
#[derive(PartialEq, Debug, Clone)]
pub enum Candidates {
    Aligned(AlignedCandidates),
    Dropdown(DropdownCandidates),
}

// ******** Output data structures *********

/// The outcome of resolving one cell.
#[derive(PartialEq, Debug, Clone)]
pub enum Resolution {
    /// No view, or only empty views.
    Blank,
    /// A canonical value was selected. `autoresolved` is set when the support
    /// was not unanimous.
    Resolved { value: String, autoresolved: bool },
    /// The candidates must be reviewed by a human.
    Unresolved(Unresolved),
}

impl Resolution {
    pub fn is_blank(&self) -> bool {
        matches!(self, Resolution::Blank)
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, Resolution::Unresolved(_))
    }

    pub fn is_autoresolved(&self) -> bool {
        matches!(
            self,
            Resolution::Resolved {
                autoresolved: true,
                ..
            }
        )
    }

    /// The value of a resolved cell.
    pub fn value(&self) -> Option<&str> {
        match self {
            Resolution::Resolved { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }

    /// The text written in the output table for this cell.
    pub fn render(&self) -> String {
        match self {
            Resolution::Blank => "".to_string(),
            Resolution::Resolved { value, .. } => value.clone(),
            Resolution::Unresolved(u) => u.render(),
        }
    }
}

pub const NO_BEST_GUESS: &str = "<No best guess>";
pub const UNRESOLVED_SEPARATOR: &str = "----------";

/// The candidates of a cell that could not be resolved, kept verbatim.
#[derive(PartialEq, Debug, Clone)]
pub struct Unresolved {
    pub reason: UnresolvedReason,
    pub best_guess: Option<String>,
    /// Distinct candidates with their counts, in first-seen order.
    pub candidates: Vec<(String, u64)>,
}

impl Unresolved {
    /// Renders the candidates for manual review:
    ///
    /// ```text
    /// <No best guess>
    /// ----------
    /// 3 @1
    /// 4 @1
    /// ```
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = vec![
            self.best_guess
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NO_BEST_GUESS.to_string()),
            UNRESOLVED_SEPARATOR.to_string(),
        ];
        for (candidate, count) in self.candidates.iter() {
            lines.push(format!("{} @{}", candidate, count));
        }
        lines.join("\n")
    }
}

/// Why a cell was routed to manual review.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum UnresolvedReason {
    /// A transcription carries a marker of doubt from the volunteer.
    Uncertain(UncertaintyMarker),
    /// The consensus score is below the text threshold.
    LowConsensus,
    /// No category reached the vote threshold.
    NoMajority,
    /// The candidates do not form a single group.
    Shape,
    /// A value could not be read as a number.
    NotANumber,
    /// A value is a number but not an integer.
    NotIntegral,
    /// An integer too large to be held exactly.
    OutOfRange,
    /// A value does not look like `d-m-y`.
    DateShape,
    /// One of the day, month or year is zero.
    ZeroDateComponent,
    /// The day, month and year do not form a calendar date.
    InvalidDate,
    /// A view does not hold exactly two parts.
    CompoundShape,
}

impl Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedReason::Uncertain(m) => write!(f, "uncertain transcription ({})", m),
            UnresolvedReason::LowConsensus => write!(f, "consensus score below threshold"),
            UnresolvedReason::NoMajority => write!(f, "no candidate reached the threshold"),
            UnresolvedReason::Shape => write!(f, "candidates are not a single group"),
            UnresolvedReason::NotANumber => write!(f, "not a number"),
            UnresolvedReason::NotIntegral => write!(f, "not an integer"),
            UnresolvedReason::OutOfRange => write!(f, "integer out of range"),
            UnresolvedReason::DateShape => write!(f, "not a d-m-y date"),
            UnresolvedReason::ZeroDateComponent => write!(f, "zero in a date component"),
            UnresolvedReason::InvalidDate => write!(f, "not a calendar date"),
            UnresolvedReason::CompoundShape => write!(f, "not exactly two parts"),
        }
    }
}

/// The patterns of doubt that veto the vote on a cell.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum UncertaintyMarker {
    /// `[illegible]`
    Brackets,
    /// `Smith (?)`
    ParenthesisedQuestion,
    /// `Sm??h`
    QuestionMarks,
    /// `J. Smith`: a leading letter followed by a period.
    LeadingAbbreviation,
}

impl Display for UncertaintyMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UncertaintyMarker::Brackets => "brackets",
            UncertaintyMarker::ParenthesisedQuestion => "parenthesised question mark",
            UncertaintyMarker::QuestionMarks => "question marks",
            UncertaintyMarker::LeadingAbbreviation => "leading abbreviation",
        };
        write!(f, "{}", s)
    }
}

/// The resolution of one cell, with the number of views that contributed.
#[derive(PartialEq, Debug, Clone)]
pub struct CellResolution {
    pub resolution: Resolution,
    pub views: u32,
}

/// Errors that prevent a run from completing.
///
/// Disagreement between volunteers is never an error: it is reported as
/// `Resolution::Unresolved`. These errors mean that the input tables, the
/// configuration or the label tables are out of sync.
#[derive(PartialEq, Debug, Clone)]
pub enum ConsensusError {
    /// A threshold outside of (0, 1].
    InvalidThreshold(f64),
    /// The candidates of a cell do not have the shape the reducer guarantees.
    MalformedCandidates {
        field: String,
        key: CellKey,
        detail: String,
    },
    /// A dropdown code is absent from all the label tables of the field.
    UnknownCode {
        field: String,
        key: CellKey,
        code: String,
    },
    /// A dropdown code decodes to several labels.
    AmbiguousCode {
        field: String,
        key: CellKey,
        code: String,
        labels: Vec<String>,
    },
    /// A field name that was not registered.
    UnknownField(String),
    /// A field name registered twice.
    DuplicateField(String),
    /// A subject has no volume and page metadata.
    MissingSubject(u64),
}

impl Error for ConsensusError {}

impl Display for ConsensusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConsensusError::InvalidThreshold(t) => {
                write!(f, "threshold {} is not in the range (0, 1]", t)
            }
            ConsensusError::MalformedCandidates { field, key, detail } => {
                write!(f, "malformed candidates for {:?} at {}: {}", field, key, detail)
            }
            ConsensusError::UnknownCode { field, key, code } => write!(
                f,
                "no label for code {:?} in field {:?} at {}",
                code, field, key
            ),
            ConsensusError::AmbiguousCode {
                field,
                key,
                code,
                labels,
            } => write!(
                f,
                "code {:?} in field {:?} at {} matches several labels: {:?}",
                code, field, key, labels
            ),
            ConsensusError::UnknownField(name) => write!(f, "unknown field {:?}", name),
            ConsensusError::DuplicateField(name) => write!(f, "field {:?} declared twice", name),
            ConsensusError::MissingSubject(sid) => {
                write!(f, "no volume and page metadata for subject {}", sid)
            }
        }
    }
}

// ********* Configuration **********

/// A fraction of the votes (or of the views) in the range (0, 1].
#[derive(PartialEq, Debug, Clone, Copy, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Threshold, ConsensusError> {
        if value > 0.0 && value <= 1.0 {
            Ok(Threshold(value))
        } else {
            Err(ConsensusError::InvalidThreshold(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// True if `part` out of `total` reaches the threshold. The bound is inclusive.
    pub fn is_reached(&self, part: f64, total: f64) -> bool {
        total > 0.0 && part / total >= self.0
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct ResolutionRules {
    /// Minimum ratio of consensus score to views for free text.
    pub text_threshold: Threshold,
    /// Minimum share of the votes for the other kinds.
    pub vote_threshold: Threshold,
    /// Veto the vote on cells whose transcriptions carry a marker of doubt.
    pub uncertainty_check: bool,
    /// The separator between the two parts of a compound number.
    pub compound_delimiter: char,
}

impl ResolutionRules {
    pub const DEFAULT_RULES: ResolutionRules = ResolutionRules {
        text_threshold: Threshold(0.66),
        vote_threshold: Threshold(0.66),
        uncertainty_check: false,
        compound_delimiter: ';',
    };
}

/// A field that does not exist on the pages of one volume.
///
/// Values found in this field on this volume are cleared and recorded as
/// autoresolved, and the field does not count towards blanks or completeness.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Exemption {
    pub field: String,
    pub volume: u32,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AssemblyRules {
    /// The number of views after which a cell is retired.
    pub retirement_count: u32,
    /// The number of logical rows on a page.
    pub rows_per_page: usize,
    /// Keep the pages that are not complete yet.
    pub include_unfinished: bool,
    pub exemptions: Vec<Exemption>,
    /// Scan the resolved values for leftover markers.
    pub transcriptionism_check: bool,
    /// Fields in which a value of zero is legitimate.
    pub zero_allowed: Vec<String>,
}

impl AssemblyRules {
    pub const DEFAULT_ROWS_PER_PAGE: usize = 25;
    pub const DEFAULT_RETIREMENT_COUNT: u32 = 3;

    pub fn is_exempt(&self, field: &str, volume: u32) -> bool {
        self.exemptions
            .iter()
            .any(|e| e.field == field && e.volume == volume)
    }
}

impl Default for AssemblyRules {
    fn default() -> Self {
        AssemblyRules {
            retirement_count: AssemblyRules::DEFAULT_RETIREMENT_COUNT,
            rows_per_page: AssemblyRules::DEFAULT_ROWS_PER_PAGE,
            include_unfinished: false,
            exemptions: vec![],
            transcriptionism_check: true,
            zero_allowed: vec![],
        }
    }
}

/// Where a subject sits in the ledgers.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PageInfo {
    pub volume: u32,
    pub page: i32,
    /// The location of the scanned image.
    pub location: String,
}
