//! Synthetic cumulative-count series.
//!
//! Each series is a model curve sampled at `x = 1..=days` plus Gaussian noise,
//! with counts clamped at zero. The RNG is seeded, so a given `SyntheticSpec` always
//! produces the same series.

use chrono::Duration;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{DailyRecord, ModelKind, Observation, SyntheticSpec};
use crate::error::AppError;
use crate::models::{is_admissible, predict};

/// A generated series with the parameters it was drawn from.
#[derive(Debug, Clone)]
pub struct SyntheticSeries {
    pub theta: Vec<f64>,
    pub records: Vec<DailyRecord>,
    /// Same values as `records`, indexed from `x = 1`.
    pub observations: Vec<Observation>,
}

/// Parameters used when the caller gives none.
pub fn default_theta(kind: ModelKind) -> Vec<f64> {
    match kind {
        ModelKind::Exponential => vec![100.0, 0.15],
        ModelKind::Logistic => vec![5000.0, 20.0, 3.0],
        ModelKind::Gompertz => vec![5000.0, 8.0, 0.85],
    }
}

pub fn generate_observations(spec: &SyntheticSpec) -> Result<SyntheticSeries, AppError> {
    if spec.days == 0 {
        return Err(AppError::new(2, "Synthetic series needs at least one day."));
    }
    if !(spec.noise_sd.is_finite() && spec.noise_sd >= 0.0) {
        return Err(AppError::new(2, "Synthetic noise must be finite and >= 0."));
    }

    let theta = spec.theta.clone().unwrap_or_else(|| default_theta(spec.kind));
    if !is_admissible(spec.kind, &theta) {
        return Err(AppError::new(
            2,
            format!(
                "Invalid {} parameters {theta:?}: expected {} values ({}).",
                spec.kind,
                spec.kind.param_count(),
                spec.kind.param_names().join(", ")
            ),
        ));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut records = Vec::with_capacity(spec.days as usize);
    let mut observations = Vec::with_capacity(spec.days as usize);
    for x in 1..=spec.days {
        let mean = predict(spec.kind, f64::from(x), &theta);
        if !mean.is_finite() {
            return Err(AppError::new(
                2,
                format!("Synthetic {} curve overflows at day {x}.", spec.kind),
            ));
        }
        let y = (mean + normal.sample(&mut rng)).max(0.0);
        let date = spec
            .start_date
            .checked_add_signed(Duration::days(i64::from(x) - 1))
            .ok_or_else(|| AppError::new(2, "Synthetic date range overflows the calendar."))?;

        records.push(DailyRecord { date, y });
        observations.push(Observation { x, date, y });
    }

    Ok(SyntheticSeries {
        theta,
        records,
        observations,
    })
}
