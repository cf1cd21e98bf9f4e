//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and forecasting
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Minimum number of observations: a 3-parameter model plus one residual degree of freedom.
pub const MIN_OBSERVATIONS: usize = 4;

/// Default number of days forecast past the last observation.
pub const DEFAULT_HORIZON_DAYS: u32 = 14;

/// Default two-sided confidence level for prediction intervals.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// One day of the input series, before the day index is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    /// Cumulative count on `date`.
    pub y: f64,
}

/// A normalized observation used for fitting.
///
/// `x` is the day offset from the first kept date, starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub x: u32,
    pub date: NaiveDate,
    pub y: f64,
}

impl Observation {
    pub fn x_f64(&self) -> f64 {
        f64::from(self.x)
    }
}

/// Summary stats about the observations actually used for fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n: usize,
    pub x_min: u32,
    pub x_max: u32,
    pub date_min: NaiveDate,
    pub date_max: NaiveDate,
    pub y_min: f64,
    pub y_max: f64,
}

/// Concrete growth model kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// `θ1·exp(θ2·x)`
    Exponential,
    /// `θ1 / (1 + exp((θ2 − x)/θ3))`
    Logistic,
    /// `θ1·exp(−θ2·θ3^x)`
    Gompertz,
}

impl ModelKind {
    /// Canonical order used for fitting and for tie-breaking in rankings.
    pub const ALL: [ModelKind; 3] = [ModelKind::Exponential, ModelKind::Logistic, ModelKind::Gompertz];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Exponential => "Exponential",
            ModelKind::Logistic => "Logistic",
            ModelKind::Gompertz => "Gompertz",
        }
    }

    /// Number of free parameters in the mean function.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Exponential => 2,
            ModelKind::Logistic | ModelKind::Gompertz => 3,
        }
    }

    /// Short parameter labels, in `θ` order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Exponential => &["scale", "rate"],
            ModelKind::Logistic => &["asym", "xmid", "scal"],
            ModelKind::Gompertz => &["asym", "b2", "b3"],
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Which model(s) to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSpec {
    All,
    Exponential,
    Logistic,
    Gompertz,
}

impl ModelSpec {
    pub fn kinds(self) -> Vec<ModelKind> {
        match self {
            ModelSpec::All => ModelKind::ALL.to_vec(),
            ModelSpec::Exponential => vec![ModelKind::Exponential],
            ModelSpec::Logistic => vec![ModelKind::Logistic],
            ModelSpec::Gompertz => vec![ModelKind::Gompertz],
        }
    }
}

/// Goodness-of-fit summary for one fitted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitMetrics {
    /// Number of observations.
    pub n: usize,
    /// Number of mean-function parameters.
    pub p: usize,
    /// Residual sum of squares.
    pub rss: f64,
    /// Residual degrees of freedom `n - p`.
    pub df: usize,
    /// Residual variance `RSS / (n - p)`.
    pub sigma2: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    pub bic: f64,
    pub r_squared: f64,
}

/// A successfully fitted model. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub kind: ModelKind,
    pub theta: Vec<f64>,
    pub std_errors: Vec<f64>,
    /// `σ̂²·(JᵀJ)⁻¹`, row-major `p × p`.
    pub covariance: Vec<Vec<f64>>,
    /// `μ(x_i; θ̂)` for every observation, in observation order.
    pub fitted: Vec<f64>,
    pub metrics: FitMetrics,
    /// Accepted optimizer iterations.
    pub iterations: usize,
}

/// One row of the AIC ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedModel {
    pub kind: ModelKind,
    pub aic: f64,
    pub bic: f64,
    /// `AIC - min(AIC)` across the ranked models.
    pub delta_aic: f64,
    /// `exp(-Δ/2)` normalised over the ranked models.
    pub akaike_weight: f64,
    pub r_squared: f64,
}

/// A model that was attempted but did not produce a usable fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFailure {
    pub kind: ModelKind,
    pub reason: String,
}

/// Output of fitting + ranking all requested models on one series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    /// Successful fits, in canonical model order.
    pub fits: Vec<FittedModel>,
    /// Successful fits ordered by AIC (lowest first).
    pub ranking: Vec<RankedModel>,
    /// Models that failed, with the reason.
    pub failures: Vec<ModelFailure>,
}

impl ModelComparison {
    pub fn fit(&self, kind: ModelKind) -> Option<&FittedModel> {
        self.fits.iter().find(|f| f.kind == kind)
    }

    /// The lowest-AIC model, if any model fitted.
    pub fn best(&self) -> Option<&FittedModel> {
        self.ranking.first().and_then(|r| self.fit(r.kind))
    }
}

/// One forecast row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub x: u32,
    pub date: NaiveDate,
    pub fit: f64,
    pub lower: f64,
    pub upper: f64,
    /// `false` when the interval could not be computed and both bounds equal `fit`.
    pub interval_valid: bool,
}

/// Point predictions and prediction intervals of one model over the extended range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastTable {
    pub model: ModelKind,
    pub confidence: f64,
    /// Student-t critical value used for the bounds (absent when unavailable).
    pub t_critical: Option<f64>,
    pub rows: Vec<ForecastRow>,
    /// Set when at least one row carries a zero-width fallback interval.
    pub interval_warning: Option<String>,
}

impl ForecastTable {
    pub fn intervals_available(&self) -> bool {
        self.interval_warning.is_none()
    }
}

/// How raw CSV rows are interpreted.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub date_column: String,
    pub count_column: String,
    /// Explicit `chrono` format; when absent a list of common formats is tried.
    pub date_format: Option<String>,
    /// Drop observations before this date.
    pub start: Option<NaiveDate>,
    /// Drop observations after this date.
    pub end: Option<NaiveDate>,
}

impl Default for InputSpec {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            count_column: "cases".to_string(),
            date_format: None,
            start: None,
            end: None,
        }
    }
}

/// Parameters for an offline synthetic series.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub kind: ModelKind,
    /// True parameters; `None` uses the model's built-in demo curve.
    pub theta: Option<Vec<f64>>,
    pub days: u32,
    /// Standard deviation of additive Gaussian noise.
    pub noise_sd: f64,
    pub seed: u64,
    pub start_date: NaiveDate,
}

/// Where the series comes from.
#[derive(Debug, Clone)]
pub enum DataSource {
    /// A local path or an `http(s)://` URL to a CSV file.
    Location(String),
    Synthetic(SyntheticSpec),
}

impl DataSource {
    pub fn label(&self) -> String {
        match self {
            DataSource::Location(loc) => loc.clone(),
            DataSource::Synthetic(spec) => format!(
                "synthetic {} (days={}, noise={}, seed={})",
                spec.kind, spec.days, spec.noise_sd, spec.seed
            ),
        }
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub source: DataSource,
    pub input: InputSpec,
    pub model_spec: ModelSpec,

    pub max_iterations: usize,
    pub tolerance: f64,

    pub horizon: u32,
    pub confidence: f64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Model drawn in the plot; `None` draws the lowest-AIC model.
    pub plot_model: Option<ModelKind>,

    pub export_forecast: Option<PathBuf>,
    pub export_report: Option<PathBuf>,
}

impl FitConfig {
    /// Reject settings the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.confidence.is_finite() && self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(format!("Confidence level must be in (0, 1), got {}.", self.confidence));
        }
        if self.max_iterations == 0 {
            return Err("Max iterations must be > 0.".to_string());
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(format!("Tolerance must be finite and > 0, got {}.", self.tolerance));
        }
        if let (Some(start), Some(end)) = (self.input.start, self.input.end) {
            if end < start {
                return Err(format!("Date window is inverted: start={start} > end={end}."));
            }
        }
        if let DataSource::Synthetic(spec) = &self.source {
            if !(spec.noise_sd.is_finite() && spec.noise_sd >= 0.0) {
                return Err("Synthetic noise must be finite and >= 0.".to_string());
            }
        }
        Ok(())
    }
}

/// A saved report file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFile {
    pub tool: String,
    pub source: String,
    pub confidence: f64,
    pub horizon: u32,
    pub observations: Vec<Observation>,
    pub comparison: ModelComparison,
    pub forecasts: Vec<ForecastTable>,
}
