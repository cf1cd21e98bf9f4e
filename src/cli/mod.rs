//! Command-line parsing for the growth curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::data::source::DEFAULT_SOURCE_URL;
use crate::domain::{ModelKind, ModelSpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "growth",
    version,
    about = "Fit exponential, logistic and Gompertz growth curves and forecast with prediction intervals"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit all models, print the comparison and forecasts, and optionally plot/export.
    Fit(FitArgs),
    /// Print the AIC comparison only (useful for scripting).
    Rank(FitArgs),
    /// Plot a previously exported report JSON.
    Plot(PlotArgs),
}

/// Common options for fitting and ranking.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// CSV path or http(s) URL with one row per day.
    #[arg(short = 'i', long, env = "GROWTH_DATA_URL", default_value = DEFAULT_SOURCE_URL)]
    pub input: String,

    /// Column holding the calendar date.
    #[arg(long, default_value = "date")]
    pub date_column: String,

    /// Column holding the cumulative count.
    #[arg(long, default_value = "cases")]
    pub count_column: String,

    /// Explicit chrono date format (e.g. %d/%m/%Y); common formats are tried otherwise.
    #[arg(long)]
    pub date_format: Option<String>,

    /// Ignore observations before this date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_iso_date)]
    pub start: Option<NaiveDate>,

    /// Ignore observations after this date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_iso_date)]
    pub end: Option<NaiveDate>,

    /// Generate a synthetic series from this model instead of reading input.
    #[arg(long, value_enum)]
    pub synthetic: Option<ModelKind>,

    /// Synthetic series length in days.
    #[arg(long, default_value_t = 40)]
    pub days: u32,

    /// Standard deviation of the synthetic noise.
    #[arg(long, default_value_t = 10.0)]
    pub noise: f64,

    /// Random seed for the synthetic series.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// True parameters of the synthetic curve, comma separated.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub theta: Option<Vec<f64>>,

    /// Which model(s) to fit.
    #[arg(long, value_enum, default_value_t = ModelSpec::All)]
    pub model: ModelSpec,

    /// Days forecast past the last observation.
    #[arg(long, default_value_t = 14)]
    pub horizon: u32,

    /// Two-sided confidence level of the prediction intervals.
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Optimizer iteration cap per start.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,

    /// Relative SSE reduction below which the optimizer may stop (the remaining
    /// Gauss-Newton step must also be negligible).
    #[arg(long, default_value_t = 1e-8)]
    pub tol: f64,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Model to plot (defaults to the lowest-AIC model).
    #[arg(long, value_enum)]
    pub plot_model: Option<ModelKind>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export every forecast row of every model to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export observations, comparison and forecasts to JSON.
    #[arg(long = "export-report")]
    pub export_report: Option<PathBuf>,
}

/// Options for plotting a saved report.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Report JSON file produced by `growth fit --export-report`.
    #[arg(long, value_name = "JSON")]
    pub report: PathBuf,

    /// Model to plot (defaults to the lowest-AIC model in the report).
    #[arg(long, value_enum)]
    pub model: Option<ModelKind>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

fn parse_iso_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}
