//! Point forecasts and prediction intervals.
//!
//! For every `x` in `min(x_obs) ..= max(x_obs) + horizon` the forecaster
//! evaluates the fitted mean and a two-sided Student-t prediction interval
//!
//! ```text
//! Var(ŷ) = ∇μ(x)ᵀ · Cov(θ̂) · ∇μ(x) + σ̂²
//! ŷ ± t(1 − α/2, n − p) · sqrt(Var(ŷ))
//! ```
//!
//! When a row's variance or bounds come out non-finite (or no critical value
//! exists), the row falls back to a zero-width interval with
//! `interval_valid = false` and the table carries a warning. That fallback is
//! never an error.

use chrono::{Duration, NaiveDate};
use tracing::warn;

use crate::domain::{
    DEFAULT_CONFIDENCE, DEFAULT_HORIZON_DAYS, FittedModel, ForecastRow, ForecastTable, ModelComparison, Observation,
};
use crate::math::t_critical;
use crate::models::{fill_gradient_row, predict};

#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Days past the last observation.
    pub horizon: u32,
    /// Two-sided confidence level in (0, 1).
    pub confidence: f64,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON_DAYS,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

/// Forecast every successful fit of a comparison, in canonical model order.
pub fn forecast_all(
    comparison: &ModelComparison,
    observations: &[Observation],
    opts: &ForecastOptions,
) -> Vec<ForecastTable> {
    comparison
        .fits
        .iter()
        .map(|fit| forecast_model(fit, observations, opts))
        .collect()
}

/// Point predictions and prediction intervals of one fitted model over the
/// observed range extended by `opts.horizon` days.
pub fn forecast_model(fit: &FittedModel, observations: &[Observation], opts: &ForecastOptions) -> ForecastTable {
    let t = t_critical(opts.confidence, fit.metrics.df);

    let Some((anchor_x, anchor_date, x_min, x_max)) = observed_range(observations) else {
        return ForecastTable {
            model: fit.kind,
            confidence: opts.confidence,
            t_critical: t,
            rows: Vec::new(),
            interval_warning: None,
        };
    };

    let end = x_max.saturating_add(opts.horizon);
    let mut grad = vec![0.0; fit.theta.len()];
    let mut rows = Vec::with_capacity((end - x_min) as usize + 1);
    let mut degraded = 0usize;

    for x in x_min..=end {
        let xf = f64::from(x);
        let mean = predict(fit.kind, xf, &fit.theta);
        let date = anchor_date + Duration::days(i64::from(x) - i64::from(anchor_x));

        let half_width = t.and_then(|t| {
            fill_gradient_row(fit.kind, xf, &fit.theta, &mut grad);
            let var = prediction_variance(&grad, &fit.covariance, fit.metrics.sigma2)?;
            let hw = t * var.sqrt();
            (hw.is_finite() && (mean - hw).is_finite() && (mean + hw).is_finite()).then_some(hw)
        });

        let row = match half_width {
            Some(hw) => ForecastRow {
                x,
                date,
                fit: mean,
                lower: mean - hw,
                upper: mean + hw,
                interval_valid: true,
            },
            None => {
                degraded += 1;
                ForecastRow {
                    x,
                    date,
                    fit: mean,
                    lower: mean,
                    upper: mean,
                    interval_valid: false,
                }
            }
        };
        rows.push(row);
    }

    let interval_warning = (degraded > 0).then(|| {
        warn!(model = %fit.kind, degraded, total = rows.len(), "prediction interval unavailable");
        format!(
            "prediction interval unavailable for {degraded} of {} rows; bounds set to the point forecast",
            rows.len()
        )
    });

    ForecastTable {
        model: fit.kind,
        confidence: opts.confidence,
        t_critical: t,
        rows,
        interval_warning,
    }
}

/// `gᵀ·C·g + σ²`, or `None` if the result is not a finite non-negative number.
fn prediction_variance(grad: &[f64], covariance: &[Vec<f64>], sigma2: f64) -> Option<f64> {
    if covariance.len() != grad.len() || covariance.iter().any(|row| row.len() != grad.len()) {
        return None;
    }
    let mut var = sigma2;
    for (gi, row) in grad.iter().zip(covariance) {
        for (gj, c) in grad.iter().zip(row) {
            var += gi * c * gj;
        }
    }
    // Rounding can push a near-zero quadratic form slightly negative.
    if var.is_finite() && var > -1e-12 * sigma2.abs().max(1.0) {
        Some(var.max(0.0))
    } else {
        None
    }
}

/// `(anchor x, anchor date, min x, max x)` of the observed series.
fn observed_range(observations: &[Observation]) -> Option<(u32, NaiveDate, u32, u32)> {
    let first = observations.first()?;
    let x_min = observations.iter().map(|o| o.x).min()?;
    let x_max = observations.iter().map(|o| o.x).max()?;
    Some((first.x, first.date, x_min, x_max))
}
