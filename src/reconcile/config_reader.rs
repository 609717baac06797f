use std::collections::BTreeMap;

use crate::args::Args;
use crate::reconcile::*;

use serde::{Deserialize, Serialize};
use transcription_consensus::{
    AssemblyRules, Exemption, FieldKind, ResolutionRules, Threshold,
};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    /// One of text, number, date, compoundNumber or dropdown.
    pub kind: String,
    /// The file written by the reducer for this field.
    pub reduction: String,
    /// The label tables of a dropdown field, one per version of the workflow.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "textThreshold")]
    pub text_threshold: Option<f64>,
    #[serde(rename = "voteThreshold")]
    pub vote_threshold: Option<f64>,
    #[serde(rename = "uncertaintyCheck")]
    pub uncertainty_check: Option<bool>,
    #[serde(rename = "compoundDelimiter")]
    pub compound_delimiter: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "retirementCount")]
    pub retirement_count: Option<u32>,
    #[serde(rename = "rowsPerPage")]
    pub rows_per_page: Option<usize>,
    #[serde(rename = "includeUnfinished")]
    pub include_unfinished: Option<bool>,
    #[serde(rename = "transcriptionismCheck")]
    pub transcriptionism_check: Option<bool>,
    #[serde(rename = "zeroAllowed")]
    pub zero_allowed: Option<Vec<String>>,
    #[serde(rename = "outputFile")]
    pub output_file: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ExemptionConfig {
    pub field: String,
    pub volume: u32,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// The table of volume and page of each subject.
    pub subjects: String,
    #[serde(rename = "reductionDir")]
    pub reduction_dir: Option<String>,
    pub fields: Vec<FieldConfig>,
    pub rules: Option<RulesConfig>,
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
    pub exemptions: Option<Vec<ExemptionConfig>>,
    #[serde(rename = "labelFixups")]
    pub label_fixups: Option<BTreeMap<String, String>>,
}

pub fn read_config(path: &str) -> ReconcileResult<ReconcileConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: ReconcileConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn parse_kind(kind: &str) -> ReconcileResult<FieldKind> {
    let res = match kind {
        "text" => FieldKind::Text,
        "number" => FieldKind::Number,
        "date" => FieldKind::Date,
        "compoundNumber" => FieldKind::CompoundNumber,
        "dropdown" => FieldKind::Dropdown,
        x => whatever!("Unknown field kind {:?}", x),
    };
    Ok(res)
}

fn threshold(value: Option<f64>, default: Threshold) -> ReconcileResult<Threshold> {
    match value {
        Some(t) => Threshold::new(t).context(ConsensusSnafu {}),
        None => Ok(default),
    }
}

/// The resolution rules of the configuration. Command line flags take precedence.
pub fn validate_rules(config: &ReconcileConfig, args: &Args) -> ReconcileResult<ResolutionRules> {
    let defaults = ResolutionRules::DEFAULT_RULES;
    let rules = config.rules.clone().unwrap_or(RulesConfig {
        text_threshold: None,
        vote_threshold: None,
        uncertainty_check: None,
        compound_delimiter: None,
    });
    let compound_delimiter = match rules.compound_delimiter.as_deref() {
        None => defaults.compound_delimiter,
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => c,
                _ => whatever!(
                    "compoundDelimiter must be a single character, found {:?}",
                    s
                ),
            }
        }
    };
    let res = ResolutionRules {
        text_threshold: threshold(
            args.threshold.or(rules.text_threshold),
            defaults.text_threshold,
        )?,
        vote_threshold: threshold(
            args.threshold.or(rules.vote_threshold),
            defaults.vote_threshold,
        )?,
        uncertainty_check: args.uncertainty_check || rules.uncertainty_check.unwrap_or(false),
        compound_delimiter,
    };
    Ok(res)
}

pub fn validate_assembly_rules(config: &ReconcileConfig, args: &Args) -> AssemblyRules {
    let defaults = AssemblyRules::default();
    let settings = config.output_settings.clone();
    let setting = |f: fn(&OutputSettings) -> Option<bool>| settings.as_ref().and_then(f);
    AssemblyRules {
        retirement_count: settings
            .as_ref()
            .and_then(|s| s.retirement_count)
            .unwrap_or(defaults.retirement_count),
        rows_per_page: settings
            .as_ref()
            .and_then(|s| s.rows_per_page)
            .unwrap_or(defaults.rows_per_page),
        include_unfinished: args.include_unfinished
            || setting(|s| s.include_unfinished).unwrap_or(defaults.include_unfinished),
        exemptions: config
            .exemptions
            .iter()
            .flatten()
            .map(|e| Exemption {
                field: e.field.clone(),
                volume: e.volume,
            })
            .collect(),
        transcriptionism_check: !args.no_transcriptionisms
            && setting(|s| s.transcriptionism_check).unwrap_or(defaults.transcriptionism_check),
        zero_allowed: settings
            .as_ref()
            .and_then(|s| s.zero_allowed.clone())
            .unwrap_or_default(),
    }
}
