use clap::Parser;

/// Reconciles the crowd transcriptions of ledger pages into one table.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the fields of the workflow, their reductions and the rules.
    /// Relative paths in this file are resolved against its directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory) If specified, the reductions are read from this directory. Setting this option overrides
    /// the reductionDir of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the reconciled table is written in CSV format to the given
    /// location. Setting this option overrides the outputFile that may be specified in the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference table in CSV format. If provided, the reconciled table is compared against it
    /// and the differences are printed.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path) The views ledger written by a previous run. Rows that were complete then stay complete.
    #[clap(long, value_parser)]
    pub views: Option<String>,

    /// (file path) If specified, the updated views ledger is written to this location.
    #[clap(long, value_parser)]
    pub views_out: Option<String>,

    /// (file path or 'stdout') If specified, the summary of the run is written in JSON format to this location.
    #[clap(long, value_parser)]
    pub summary: Option<String>,

    /// (number in (0, 1]) Overrides both thresholds of the configuration.
    #[clap(short, long, value_parser)]
    pub threshold: Option<f64>,

    /// Keeps the rows of the pages that are not complete yet.
    #[clap(long, takes_value = false)]
    pub include_unfinished: bool,

    /// Routes the cells whose transcriptions carry a marker of doubt to manual review.
    #[clap(long, takes_value = false)]
    pub uncertainty_check: bool,

    /// Turns off the scan of resolved values for leftover markers and zeros.
    #[clap(long, takes_value = false)]
    pub no_transcriptionisms: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
