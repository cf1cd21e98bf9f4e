//! Shared "fit pipeline" logic used by every sub-command that fits.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load -> fit + rank -> forecast
//!
//! The sub-commands can then focus on presentation (printing vs exporting).

use tracing::info;

use crate::data::{fetch_source, generate_observations};
use crate::domain::{DataSource, FitConfig, ForecastTable, ModelComparison, ReportFile};
use crate::error::AppError;
use crate::fit::selection::fit_and_rank;
use crate::forecast::{ForecastOptions, forecast_all};
use crate::io::ingest::{IngestedData, load_observations, observations_from_records};

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Human-readable description of where the data came from.
    pub source: String,
    pub ingest: IngestedData,
    pub comparison: ModelComparison,
    /// One table per successful fit, in canonical model order.
    pub forecasts: Vec<ForecastTable>,
}

impl RunOutput {
    pub fn forecast(&self, kind: crate::domain::ModelKind) -> Option<&ForecastTable> {
        self.forecasts.iter().find(|t| t.model == kind)
    }

    pub fn to_report_file(&self, config: &FitConfig) -> ReportFile {
        ReportFile {
            tool: "growth".to_string(),
            source: self.source.clone(),
            confidence: config.confidence,
            horizon: config.horizon,
            observations: self.ingest.observations.clone(),
            comparison: self.comparison.clone(),
            forecasts: self.forecasts.clone(),
        }
    }
}

/// Execute the full pipeline: load the configured source, fit, rank, forecast.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    config.validate().map_err(|msg| AppError::new(2, msg))?;

    let ingest = match &config.source {
        DataSource::Location(location) => {
            let text = fetch_source(location)?;
            load_observations(text.as_bytes(), &config.input)?
        }
        DataSource::Synthetic(spec) => {
            let series = generate_observations(spec)?;
            observations_from_records(series.records, &config.input)?
        }
    };

    run_fit_with_ingest(config, config.source.label(), ingest)
}

/// Execute fitting and forecasting on already loaded observations.
pub fn run_fit_with_ingest(config: &FitConfig, source: String, ingest: IngestedData) -> Result<RunOutput, AppError> {
    let comparison = fit_and_rank(&ingest.observations, config)?;
    if comparison.fits.is_empty() {
        let reasons: Vec<String> = comparison.failures.iter().map(|f| f.reason.clone()).collect();
        return Err(AppError::new(
            4,
            format!("No model could be fitted: {}", reasons.join("; ")),
        ));
    }

    let opts = ForecastOptions {
        horizon: config.horizon,
        confidence: config.confidence,
    };
    let forecasts = forecast_all(&comparison, &ingest.observations, &opts);
    if let Some(best) = comparison.best() {
        info!(model = %best.kind, aic = best.metrics.aic, "lowest-AIC model");
    }

    Ok(RunOutput {
        source,
        ingest,
        comparison,
        forecasts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InputSpec, ModelKind, ModelSpec, SyntheticSpec};
    use chrono::NaiveDate;
    use std::io::Write;

    fn config(source: DataSource) -> FitConfig {
        FitConfig {
            source,
            input: InputSpec::default(),
            model_spec: ModelSpec::All,
            max_iterations: 200,
            tolerance: 1e-8,
            horizon: 14,
            confidence: 0.95,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            plot_model: None,
            export_forecast: None,
            export_report: None,
        }
    }

    fn synthetic(kind: ModelKind, theta: Vec<f64>, days: u32, noise_sd: f64) -> DataSource {
        DataSource::Synthetic(SyntheticSpec {
            kind,
            theta: Some(theta),
            days,
            noise_sd,
            seed: 2020,
            start_date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        })
    }

    #[test]
    fn synthetic_logistic_end_to_end() {
        let cfg = config(synthetic(ModelKind::Logistic, vec![5000.0, 20.0, 3.0], 40, 10.0));
        let run = run_fit(&cfg).unwrap();

        let logis = run.comparison.fit(ModelKind::Logistic).unwrap();
        assert!((logis.theta[0] - 5000.0).abs() / 5000.0 < 0.10);

        for table in &run.forecasts {
            assert_eq!(table.rows.len(), (40 + 14) - 1 + 1);
            assert!(table.rows.iter().all(|r| r.upper - r.lower >= 0.0));
        }
        let report = run.to_report_file(&cfg);
        assert_eq!(report.observations.len(), 40);
        assert_eq!(report.forecasts.len(), run.comparison.fits.len());
    }

    #[test]
    fn rounded_exponential_csv_end_to_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,cases").unwrap();
        let d0 = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        // Written newest first to exercise the defensive sort.
        for x in (1..=15).rev() {
            let y = (100.0 * (0.3 * f64::from(x)).exp()).round();
            writeln!(file, "{},{y}", d0 + chrono::Duration::days(i64::from(x) - 1)).unwrap();
        }

        let mut cfg = config(DataSource::Location(file.path().display().to_string()));
        cfg.model_spec = ModelSpec::Exponential;
        let run = run_fit(&cfg).unwrap();

        let exp = run.comparison.fit(ModelKind::Exponential).unwrap();
        assert!((exp.theta[1] - 0.3).abs() / 0.3 < 0.01);
        assert!((exp.theta[0] - 100.0).abs() / 100.0 < 0.05);
        assert!(exp.metrics.r_squared > 0.9999);

        let table = run.forecast(ModelKind::Exponential).unwrap();
        assert_eq!(table.rows.first().unwrap().date, d0);
        assert_eq!(table.rows.len(), 29);
    }

    #[test]
    fn short_series_is_insufficient_data() {
        let cfg = config(synthetic(ModelKind::Logistic, vec![5000.0, 20.0, 3.0], 3, 0.0));
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 3);
    }

    #[test]
    fn invalid_config_is_rejected_before_loading() {
        let mut cfg = config(DataSource::Location("/nonexistent.csv".to_string()));
        cfg.confidence = 1.5;
        let err = run_fit(&cfg).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Confidence"));
    }

    #[test]
    fn malformed_csv_is_input_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,cases\n2020-03-01,1\n2020-03-02,two").unwrap();
        let cfg = config(DataSource::Location(file.path().display().to_string()));
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn all_zero_series_reports_failure_for_every_model() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,cases").unwrap();
        for d in 1..=10 {
            writeln!(file, "2020-03-{d:02},0").unwrap();
        }
        let cfg = config(DataSource::Location(file.path().display().to_string()));
        let err = run_fit(&cfg).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("No model could be fitted"));
    }
}
