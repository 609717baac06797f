use log::{debug, info, warn};

use snafu::{prelude::*, ErrorCompat, Snafu};
use transcription_consensus::builder::TableBuilder;
use transcription_consensus::*;

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::reconcile::config_reader::*;
use crate::reconcile::io_common::resolve_path;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_labels;
mod io_output;
mod io_subjects;
mod io_views;

#[derive(Debug, Snafu)]
pub enum ReconcileError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Error parsing label table {path}"))]
    ParsingYaml {
        source: serde_yaml::Error,
        path: String,
    },
    #[snafu(display("Error parsing {path} at line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing CSV record"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("{path}, line {lineno}, column {column}: {detail}"))]
    BadCell {
        path: String,
        lineno: usize,
        column: String,
        detail: String,
    },
    #[snafu(display("line {lineno}: cannot read task {value:?}"))]
    BadTask { lineno: usize, value: String },
    #[snafu(display("{path}: missing column {column:?}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("{path}: {detail}"))]
    BadLabels { path: String, detail: String },
    #[snafu(display("Consensus error"))]
    Consensus { source: ConsensusError },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

fn open(path: &Path) -> ReconcileResult<File> {
    File::open(path).context(OpeningFileSnafu {
        path: path.display().to_string(),
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Builds the decoder of a dropdown field from all its label tables.
fn read_decoder(
    root: &Path,
    field: &FieldConfig,
    fixups: &BTreeMap<String, String>,
) -> ReconcileResult<DropdownDecoder> {
    let mut tables: Vec<LabelTable> = Vec::with_capacity(field.labels.len());
    for lpath in field.labels.iter() {
        let p = resolve_path(root, lpath);
        let mut table = io_labels::read_label_table(open(&p)?, &display(&p))?;
        io_labels::apply_fixups(&mut table, fixups, &display(&p));
        tables.push(table);
    }
    Ok(DropdownDecoder::new(&field.name, tables))
}

fn read_field_spec(
    root: &Path,
    field: &FieldConfig,
    fixups: &BTreeMap<String, String>,
) -> ReconcileResult<FieldSpec> {
    let kind = parse_kind(&field.kind)?;
    let spec = FieldSpec::new(&field.name, kind);
    match kind {
        FieldKind::Dropdown if field.labels.is_empty() => {
            warn!(
                "No label table for dropdown field {:?}: codes are written as-is",
                field.name
            );
            Ok(spec)
        }
        FieldKind::Dropdown => Ok(spec.with_labels(read_decoder(root, field, fixups)?)),
        _ => {
            if !field.labels.is_empty() {
                warn!("Ignoring the label tables of field {:?}", field.name);
            }
            Ok(spec)
        }
    }
}

/// Reads the reduction of one field and resolves all its cells.
fn add_reduction(
    builder: &mut TableBuilder,
    path: &Path,
    spec: &FieldSpec,
) -> ReconcileResult<usize> {
    let source = display(path);
    info!("Reading reduction {:?} for field {:?}", source, spec.name);
    let candidates: Vec<(CellKey, Candidates)> = match spec.kind {
        FieldKind::Dropdown => io_csv::read_dropdown_reduction(open(path)?, &source)?
            .into_iter()
            .map(|(k, c)| (k, Candidates::Dropdown(c)))
            .collect(),
        _ => io_csv::read_text_reduction(open(path)?, &source)?
            .into_iter()
            .map(|(k, c)| (k, Candidates::Aligned(c)))
            .collect(),
    };
    for (key, c) in candidates.iter() {
        builder
            .add_candidates(&spec.name, *key, c)
            .context(ConsensusSnafu {})?;
    }
    Ok(candidates.len())
}

fn build_summary_js(table: &AssembledTable, rules: &ResolutionRules) -> JSValue {
    let s = &table.summary;
    let rejections: BTreeMap<String, usize> = s
        .uncertainty_rejections
        .iter()
        .map(|(m, n)| (m.to_string(), *n))
        .collect();
    json!({
        "config": {
            "textThreshold": rules.text_threshold.value(),
            "voteThreshold": rules.vote_threshold.value(),
            "uncertaintyCheck": rules.uncertainty_check,
            "fields": table.fields,
        },
        "results": {
            "rows": s.rows,
            "pages": s.pages,
            "droppedRows": s.dropped_rows,
            "droppedPages": s.dropped_pages,
            "unresolved": s.unresolved,
            "autoresolved": s.autoresolved,
            "blankRows": s.blank_rows,
            "transcriptionismRows": s.transcriptionism_rows,
            "uncertaintyRejections": rejections,
        }
    })
}

fn write_text(dest: &str, text: &str) -> ReconcileResult<()> {
    if dest == "stdout" {
        print!("{}", text);
        Ok(())
    } else {
        info!("Writing {}", dest);
        fs::write(dest, text).context(WritingSnafu { path: dest })
    }
}

// Line endings and trailing whitespace are not significant.
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim_end().to_string()
}

pub fn run_reconcile(args: &Args) -> ReconcileResult<()> {
    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => whatever!("A configuration file must be provided with --config"),
    };
    let config_p = Path::new(config_path.as_str());
    let config = read_config(&config_path)?;
    let root_p = config_p.parent().context(MissingParentDirSnafu {})?;

    // Validate the rules:
    let rules = validate_rules(&config, args)?;
    let assembly_rules = validate_assembly_rules(&config, args);
    info!("rules: {:?} {:?}", rules, assembly_rules);

    if config.fields.is_empty() {
        whatever!("No field declared in {}", config_path);
    }

    let subjects_p = resolve_path(root_p, &config.subjects);
    let pages = io_subjects::read_subjects(open(&subjects_p)?, &display(&subjects_p))?;

    let fixups = config.label_fixups.clone().unwrap_or_default();
    let mut builder = TableBuilder::new(&rules);
    for field in config.fields.iter() {
        let spec = read_field_spec(root_p, field, &fixups)?;
        builder = builder.field(spec).context(ConsensusSnafu {})?;
    }

    // The reductions are looked up in --input, then in the reduction directory of
    // the configuration, then next to the configuration.
    let reduction_root: PathBuf = match (&args.input, &config.reduction_dir) {
        (Some(dir), _) => PathBuf::from(dir),
        (None, Some(dir)) => resolve_path(root_p, dir),
        (None, None) => root_p.to_path_buf(),
    };
    let specs: Vec<FieldSpec> = builder.fields().to_vec();
    for (field, spec) in config.fields.iter().zip(specs.iter()) {
        let p = resolve_path(&reduction_root, &field.reduction);
        let n = add_reduction(&mut builder, &p, spec)?;
        debug!("{}: {} cells", spec.name, n);
    }

    let previous: Option<ViewsLedger> = match &args.views {
        Some(p) => Some(io_views::read_views(open(Path::new(p))?, p)?),
        None => None,
    };

    let table = builder
        .assemble(&pages, &assembly_rules, previous.as_ref())
        .context(ConsensusSnafu {})?;

    let text = io_output::render_table(&table)?;
    let out = args
        .out
        .clone()
        .or_else(|| {
            config
                .output_settings
                .as_ref()
                .and_then(|s| s.output_file.clone())
                .map(|p| {
                    if p == "stdout" {
                        p
                    } else {
                        display(&resolve_path(root_p, &p))
                    }
                })
        })
        .unwrap_or_else(|| "stdout".to_string());
    write_text(&out, &text)?;

    if let Some(p) = &args.views_out {
        info!("Writing views ledger {}", p);
        let f = File::create(p).context(WritingSnafu { path: p })?;
        io_views::write_views(f, &table.ledger, &table.fields)?;
    }

    let summary_js = build_summary_js(&table, &rules);
    let pretty_js_summary =
        serde_json::to_string_pretty(&summary_js).context(SerializingJsonSnafu {})?;
    info!("summary: {}", pretty_js_summary);
    if let Some(p) = &args.summary {
        write_text(p, &pretty_js_summary)?;
    }

    // The reference table, if provided for comparison
    if let Some(ref_p) = &args.reference {
        let reference = fs::read_to_string(ref_p).context(OpeningFileSnafu { path: ref_p })?;
        let (expected, computed) = (normalize(&reference), normalize(&text));
        if expected != computed {
            warn!("Found differences with the reference table");
            print_diff(expected.as_str(), computed.as_str(), "\n");
            whatever!("Difference detected between the reconciled table and the reference table")
        }
        info!("The reconciled table matches the reference {}", ref_p);
    }

    Ok(())
}

/// Prints an error and its causes.
pub fn report_error(e: &ReconcileError) {
    eprintln!("An error occured: {}", e);
    for cause in ErrorCompat::iter_chain(e).skip(1) {
        eprintln!("  caused by: {}", cause);
    }
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

#[cfg(test)]
fn run_reconcile_test(test_name: &str, config_lpath: &str, reference_lpath: &str) {
    let test_dir = format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"));
    info!("Running test {}", test_name);
    let out = std::env::temp_dir().join(format!("{}_output.csv", test_name));
    let args = Args {
        config: Some(format!("{}/{}/{}", test_dir, test_name, config_lpath)),
        input: None,
        out: Some(display(&out)),
        reference: Some(format!("{}/{}/{}", test_dir, test_name, reference_lpath)),
        views: None,
        views_out: None,
        summary: None,
        threshold: None,
        include_unfinished: false,
        uncertainty_check: false,
        no_transcriptionisms: false,
        verbose: false,
    };
    if let Err(e) = run_reconcile(&args) {
        report_error(&e);
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    run_reconcile_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected.csv", test_name).as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(test_name: &str, file: &str) -> String {
        format!(
            "{}/tests/data/{}/{}",
            env!("CARGO_MANIFEST_DIR"),
            test_name,
            file
        )
    }

    #[test]
    fn small_ledger() {
        test_wrapper("small_ledger");
    }

    #[test]
    fn small_ledger_views_and_summary() {
        let tmp = std::env::temp_dir();
        let views_out = display(&tmp.join("small_ledger_views.csv"));
        let summary = display(&tmp.join("small_ledger_summary.json"));
        let args = Args {
            config: Some(fixture("small_ledger", "small_ledger_config.json")),
            input: None,
            out: Some(display(&tmp.join("small_ledger_views_output.csv"))),
            reference: None,
            views: None,
            views_out: Some(views_out.clone()),
            summary: Some(summary.clone()),
            threshold: None,
            include_unfinished: false,
            uncertainty_check: false,
            no_transcriptionisms: false,
            verbose: false,
        };
        run_reconcile(&args).unwrap();

        let ledger = io_views::read_views(File::open(&views_out).unwrap(), &views_out).unwrap();
        // Subject 103 is not complete yet but stays in the ledger.
        assert!(!ledger.get(&CellKey::new(103, 0)).unwrap().complete);
        assert!(ledger.get(&CellKey::new(102, 1)).unwrap().complete);

        let js: JSValue = serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
        assert_eq!(js["results"]["rows"], json!(4));
        assert_eq!(js["results"]["droppedPages"], json!(1));
        assert_eq!(js["results"]["unresolved"], json!(5));
        assert_eq!(js["results"]["blankRows"], json!(1));
        assert_eq!(js["results"]["transcriptionismRows"], json!(1));

        // A second run that keeps the unfinished page.
        let args = Args {
            views: Some(views_out),
            views_out: None,
            summary: None,
            include_unfinished: true,
            ..args
        };
        run_reconcile(&args).unwrap();
    }

    #[test]
    fn differences_with_the_reference_are_errors() {
        let args = Args {
            config: Some(fixture("small_ledger", "small_ledger_config.json")),
            input: None,
            out: Some(display(
                &std::env::temp_dir().join("small_ledger_strict_output.csv"),
            )),
            reference: Some(fixture("small_ledger", "small_ledger_expected.csv")),
            views: None,
            views_out: None,
            summary: None,
            threshold: Some(1.0),
            include_unfinished: false,
            uncertainty_check: false,
            no_transcriptionisms: false,
            verbose: false,
        };
        assert!(matches!(
            run_reconcile(&args),
            Err(ReconcileError::Whatever { .. })
        ));
    }

    #[test]
    fn missing_config() {
        let args = Args {
            config: Some(fixture("small_ledger", "no_such_config.json")),
            input: None,
            out: None,
            reference: None,
            views: None,
            views_out: None,
            summary: None,
            threshold: None,
            include_unfinished: false,
            uncertainty_check: false,
            no_transcriptionisms: false,
            verbose: false,
        };
        assert!(matches!(
            run_reconcile(&args),
            Err(ReconcileError::OpeningFile { .. })
        ));
    }
}
