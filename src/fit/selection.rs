//! Model comparison (exponential vs logistic vs Gompertz) by AIC.
//!
//! The tool fits each requested model to the same observations and computes:
//! - RSS, residual degrees of freedom `n − p`, `σ̂² = RSS/(n − p)`
//! - Gaussian log-likelihood `−n/2·(log 2π + log σ̂² + 1)`
//! - `AIC = −2ℓ + 2(p + 1)`, `BIC = −2ℓ + log(n)(p + 1)` (the `+1` counts σ)
//! - `R² = 1 − RSS/TSS`
//!
//! Models are ranked by AIC (lowest first). The ranking is informative, not
//! an acceptance rule: every model that fits is reported. A model that fails
//! is listed with its reason and does not stop the others.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{
    FitConfig, FitMetrics, FittedModel, ModelComparison, ModelFailure, ModelKind, Observation, RankedModel,
};
use crate::error::CurveError;
use crate::fit::fitter::{FitOptions, ModelFit, fit_model};

/// Fit every model requested by `config` and rank the successes by AIC.
///
/// Only loader-level problems (fewer than the minimum number of observations)
/// are returned as `Err`; per-model failures land in `failures`.
pub fn fit_and_rank(observations: &[Observation], config: &FitConfig) -> Result<ModelComparison, CurveError> {
    let n = observations.len();
    if n < crate::domain::MIN_OBSERVATIONS {
        return Err(CurveError::EmptyDataset {
            found: n,
            required: crate::domain::MIN_OBSERVATIONS,
        });
    }

    let opts = FitOptions {
        max_iterations: config.max_iterations,
        tolerance: config.tolerance,
    };
    let kinds = config.model_spec.kinds();

    // The fits share nothing mutable, so run them in parallel and restore the
    // canonical order afterwards.
    let mut outcomes: Vec<(ModelKind, Result<FittedModel, CurveError>)> = kinds
        .par_iter()
        .map(|&kind| (kind, fit_one(kind, observations, &opts)))
        .collect();
    outcomes.sort_by_key(|(kind, _)| *kind);

    let mut fits = Vec::new();
    let mut failures = Vec::new();
    for (kind, outcome) in outcomes {
        match outcome {
            Ok(fit) => {
                info!(
                    model = %kind,
                    iterations = fit.iterations,
                    rss = fit.metrics.rss,
                    aic = fit.metrics.aic,
                    "model fitted"
                );
                fits.push(fit);
            }
            Err(err) => {
                warn!(model = %kind, error = %err, "model failed to fit");
                failures.push(ModelFailure {
                    kind,
                    reason: err.to_string(),
                });
            }
        }
    }

    let ranking = rank_by_aic(&fits);
    Ok(ModelComparison {
        fits,
        ranking,
        failures,
    })
}

/// Fit one model and attach its goodness-of-fit summary and covariance.
pub fn fit_one(kind: ModelKind, observations: &[Observation], opts: &FitOptions) -> Result<FittedModel, CurveError> {
    let fit = fit_model(kind, observations, opts)?;
    let y: Vec<f64> = observations.iter().map(|o| o.y).collect();
    Ok(to_fitted_model(fit, &y))
}

fn to_fitted_model(fit: ModelFit, y: &[f64]) -> FittedModel {
    let metrics = fit_metrics(y, fit.rss, fit.model.param_count());
    let p = fit.theta.len();

    let mut covariance = vec![vec![0.0; p]; p];
    for (i, row) in covariance.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = metrics.sigma2 * fit.jtj_inverse[(i, j)];
        }
    }
    let std_errors = (0..p).map(|j| covariance[j][j].max(0.0).sqrt()).collect();

    FittedModel {
        kind: fit.model,
        theta: fit.theta,
        std_errors,
        covariance,
        fitted: fit.fitted,
        metrics,
        iterations: fit.iterations,
    }
}

/// Goodness-of-fit summary for `p` parameters with residual sum of squares `rss`.
///
/// Requires `y.len() > p`.
pub fn fit_metrics(y: &[f64], rss: f64, p: usize) -> FitMetrics {
    let n = y.len();
    let n_f = n as f64;
    let df = n.saturating_sub(p);
    let sigma2 = rss / df.max(1) as f64;

    // Guard log(0) on exact fits.
    let log_sigma2 = sigma2.max(f64::MIN_POSITIVE).ln();
    let log_likelihood = -n_f / 2.0 * ((2.0 * std::f64::consts::PI).ln() + log_sigma2 + 1.0);
    let k = (p + 1) as f64;
    let aic = -2.0 * log_likelihood + 2.0 * k;
    let bic = -2.0 * log_likelihood + n_f.ln() * k;

    let mean = y.iter().sum::<f64>() / n_f;
    let tss: f64 = y.iter().map(|v| (v - mean) * (v - mean)).sum();
    let r_squared = if tss > 0.0 {
        1.0 - rss / tss
    } else if rss == 0.0 {
        1.0
    } else {
        0.0
    };

    FitMetrics {
        n,
        p,
        rss,
        df,
        sigma2,
        log_likelihood,
        aic,
        bic,
        r_squared,
    }
}

/// Order fits by AIC and attach ΔAIC and Akaike weights.
///
/// Ties keep canonical model order.
pub fn rank_by_aic(fits: &[FittedModel]) -> Vec<RankedModel> {
    let mut order: Vec<&FittedModel> = fits.iter().collect();
    order.sort_by(|a, b| {
        a.metrics
            .aic
            .total_cmp(&b.metrics.aic)
            .then(a.kind.cmp(&b.kind))
    });

    let Some(best_aic) = order.first().map(|f| f.metrics.aic) else {
        return Vec::new();
    };

    let raw: Vec<f64> = order
        .iter()
        .map(|f| (-(f.metrics.aic - best_aic) / 2.0).exp())
        .collect();
    let total: f64 = raw.iter().sum();

    order
        .iter()
        .zip(raw)
        .map(|(f, w)| RankedModel {
            kind: f.kind,
            aic: f.metrics.aic,
            bic: f.metrics.bic,
            delta_aic: f.metrics.aic - best_aic,
            akaike_weight: if total > 0.0 { w / total } else { 0.0 },
            r_squared: f.metrics.r_squared,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{SyntheticSeries, generate_observations};
    use crate::domain::{DataSource, InputSpec, ModelSpec, SyntheticSpec};
    use chrono::NaiveDate;

    fn base_config() -> FitConfig {
        FitConfig {
            source: DataSource::Location("unused.csv".to_string()),
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

    fn logistic_series(noise_sd: f64) -> SyntheticSeries {
        generate_observations(&SyntheticSpec {
            kind: ModelKind::Logistic,
            theta: Some(vec![5000.0, 20.0, 3.0]),
            days: 40,
            noise_sd,
            seed: 7,
            start_date: NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
        })
        .unwrap()
    }

    fn dummy_fit(kind: ModelKind, aic: f64) -> FittedModel {
        FittedModel {
            kind,
            theta: vec![],
            std_errors: vec![],
            covariance: vec![],
            fitted: vec![],
            metrics: FitMetrics {
                n: 10,
                p: kind.param_count(),
                rss: 1.0,
                df: 10 - kind.param_count(),
                sigma2: 0.1,
                log_likelihood: 0.0,
                aic,
                bic: aic,
                r_squared: 0.9,
            },
            iterations: 1,
        }
    }

    #[test]
    fn metrics_follow_gaussian_formulas() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let m = fit_metrics(&y, 2.0, 2);
        assert_eq!(m.df, 4);
        assert!((m.sigma2 - 0.5).abs() < 1e-12);
        let ll = -3.0 * ((2.0 * std::f64::consts::PI).ln() + 0.5_f64.ln() + 1.0);
        assert!((m.log_likelihood - ll).abs() < 1e-12);
        assert!((m.aic - (-2.0 * ll + 6.0)).abs() < 1e-12);
        assert!((m.bic - (-2.0 * ll + 6.0_f64.ln() * 3.0)).abs() < 1e-12);
        // TSS = 17.5
        assert!((m.r_squared - (1.0 - 2.0 / 17.5)).abs() < 1e-12);
    }

    #[test]
    fn ranking_orders_by_aic_with_weights() {
        let fits = vec![
            dummy_fit(ModelKind::Exponential, 120.0),
            dummy_fit(ModelKind::Logistic, 100.0),
            dummy_fit(ModelKind::Gompertz, 102.0),
        ];
        let ranking = rank_by_aic(&fits);
        let kinds: Vec<ModelKind> = ranking.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ModelKind::Logistic, ModelKind::Gompertz, ModelKind::Exponential]);
        assert_eq!(ranking[0].delta_aic, 0.0);
        assert!((ranking[1].delta_aic - 2.0).abs() < 1e-12);
        let total: f64 = ranking.iter().map(|r| r.akaike_weight).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(ranking[0].akaike_weight > ranking[1].akaike_weight);
    }

    #[test]
    fn too_few_observations_is_rejected() {
        let series = logistic_series(0.0);
        let err = fit_and_rank(&series.observations[..3], &base_config()).unwrap_err();
        assert_eq!(err, CurveError::EmptyDataset { found: 3, required: 4 });
    }

    #[test]
    fn noisy_logistic_recovers_asymptote_and_ranks_sigmoids_first() {
        let series = logistic_series(10.0);
        let comparison = fit_and_rank(&series.observations, &base_config()).unwrap();

        let logis = comparison.fit(ModelKind::Logistic).expect("logistic fits");
        assert!((logis.theta[0] - 5000.0).abs() / 5000.0 < 0.10, "asym={}", logis.theta[0]);
        assert!(logis.metrics.rss >= 0.0);
        assert!(logis.metrics.df >= 1);
        assert!(logis.std_errors.iter().all(|s| s.is_finite() && *s >= 0.0));

        // The plain exponential cannot bend over; it must not win.
        let best = comparison.best().unwrap();
        assert_ne!(best.kind, ModelKind::Exponential);
        assert_eq!(comparison.fits.len() + comparison.failures.len(), 3);
    }

    #[test]
    fn every_converged_fit_has_nonnegative_rss_and_positive_df() {
        for kind in ModelKind::ALL {
            let series = generate_observations(&SyntheticSpec {
                kind,
                theta: None,
                days: 30,
                noise_sd: 5.0,
                seed: 11,
                start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            })
            .unwrap();
            let comparison = fit_and_rank(&series.observations, &base_config()).unwrap();
            for fit in &comparison.fits {
                assert!(fit.metrics.rss >= 0.0);
                assert!(fit.metrics.df >= 1);
                assert_eq!(fit.fitted.len(), series.observations.len());
            }
        }
    }

    #[test]
    fn aic_order_is_invariant_under_affine_day_index() {
        let series = logistic_series(10.0);
        let shifted: Vec<Observation> = series
            .observations
            .iter()
            .map(|o| Observation {
                x: 2 * o.x + 5,
                date: o.date,
                y: o.y,
            })
            .collect();

        let a = fit_and_rank(&series.observations, &base_config()).unwrap();
        let b = fit_and_rank(&shifted, &base_config()).unwrap();

        let kinds_a: Vec<ModelKind> = a.ranking.iter().map(|r| r.kind).collect();
        let kinds_b: Vec<ModelKind> = b.ranking.iter().map(|r| r.kind).collect();
        assert_eq!(kinds_a, kinds_b);
        for (ra, rb) in a.ranking.iter().zip(&b.ranking) {
            assert!((ra.aic - rb.aic).abs() < 1e-3 * ra.aic.abs().max(1.0), "{} vs {}", ra.aic, rb.aic);
        }
    }

    #[test]
    fn single_model_spec_fits_only_that_model() {
        let series = logistic_series(10.0);
        let mut config = base_config();
        config.model_spec = ModelSpec::Logistic;
        let comparison = fit_and_rank(&series.observations, &config).unwrap();
        assert_eq!(comparison.fits.len(), 1);
        assert_eq!(comparison.ranking[0].kind, ModelKind::Logistic);
        assert!(comparison.failures.is_empty());
    }

    #[test]
    fn exact_exponential_recovers_parameters_with_unit_r_squared() {
        let d0 = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        for (c, r) in [(100.0, 0.3), (5.0, -0.2), (1.0, 0.05)] {
            let observations: Vec<Observation> = (1..=15u32)
                .map(|x| Observation {
                    x,
                    date: d0 + chrono::Duration::days(i64::from(x) - 1),
                    y: c * (r * f64::from(x)).exp(),
                })
                .collect();

            let fit = fit_one(ModelKind::Exponential, &observations, &FitOptions::default()).unwrap();
            assert!((fit.theta[0] - c).abs() / c < 1e-6, "c={c}: got {}", fit.theta[0]);
            assert!((fit.theta[1] - r).abs() < 1e-8, "r={r}: got {}", fit.theta[1]);
            assert!(
                (fit.metrics.r_squared - 1.0).abs() < 1e-12,
                "c={c} r={r}: R² = {}",
                fit.metrics.r_squared
            );
            assert!(fit.metrics.rss >= 0.0);
        }
    }
}
