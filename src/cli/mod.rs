//! Command-line parsing for the quantile-regression sweep.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the estimation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{OutputFormat, SeMethod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "qreg", version, about = "Quantile regression sweep with OLS comparison")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit OLS and a quantile sweep, print the comparison table and plot, optionally export.
    Fit(FitArgs),
    /// Load the dataset and print per-variable summary statistics.
    Describe(DataArgs),
}

/// Where the data comes from.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Dataset path or http(s) URL (.dta or .csv). Defaults to `QREG_DATA_URL`
    /// or the medical-expenditure example.
    #[arg(long, value_name = "PATH|URL", conflicts_with = "synthetic")]
    pub data: Option<String>,

    /// Use an offline synthetic dataset with the medical-expenditure schema.
    #[arg(long)]
    pub synthetic: bool,

    /// Rows in the synthetic dataset.
    #[arg(long, default_value_t = 3064)]
    pub synthetic_rows: usize,

    /// Random seed for the synthetic dataset.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Download attempts before giving up.
    #[arg(long, default_value_t = 3)]
    pub retries: usize,
}

/// Options for `qreg fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Dependent variable.
    #[arg(short = 'y', long, default_value = "ltotexp")]
    pub dependent: String,

    /// Regressors, comma separated.
    #[arg(
        short = 'x',
        long,
        value_delimiter = ',',
        default_values = ["suppins", "totchr", "age", "female", "white"]
    )]
    pub regressors: Vec<String>,

    /// Fit without a constant term.
    #[arg(long)]
    pub no_intercept: bool,

    /// Quantiles to fit, comma separated, each strictly between 0 and 1.
    #[arg(
        short = 'q',
        long,
        value_delimiter = ',',
        default_values_t = [0.1, 0.25, 0.5, 0.75, 0.9]
    )]
    pub quantiles: Vec<f64>,

    /// Confidence level for intervals.
    #[arg(long, default_value_t = 0.95)]
    pub level: f64,

    /// Standard-error method for quantile fits.
    #[arg(long, value_enum, default_value_t = SeMethod::Nid)]
    pub se: SeMethod,

    /// Maximum MM iterations per quantile fit.
    #[arg(long, default_value_t = 5000)]
    pub max_iter: usize,

    /// Relative check-loss change that counts as converged.
    #[arg(long, default_value_t = 1e-9)]
    pub tolerance: f64,

    /// Whole-sweep deadline in seconds; unfinished quantiles are reported as timed out.
    #[arg(long)]
    pub timeout_secs: Option<f64>,

    /// Report the quantiles that did fit instead of failing the run.
    #[arg(long)]
    pub allow_partial: bool,

    /// Table format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Disable the coefficient plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns) per panel.
    #[arg(long, default_value_t = 60)]
    pub width: usize,

    /// Plot height (rows) per panel.
    #[arg(long, default_value_t = 15)]
    pub height: usize,

    /// Export merged coefficient rows to CSV.
    #[arg(long, value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Export merged coefficient rows with run metadata to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_json: Option<PathBuf>,
}
