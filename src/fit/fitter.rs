//! Low-level fitting routine for a single model kind.
//!
//! Given observations `(x_i, y_i)` and a model `μ(x; θ)`, we minimize
//!
//! ```text
//! S(θ) = Σ (y_i − μ(x_i; θ))²
//! ```
//!
//! with Levenberg–Marquardt:
//!
//! - solve `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr` for the step
//! - accept the step if it stays in the parameter domain, keeps residuals
//!   finite and lowers `S`; shrink `λ` on success, grow it on rejection
//! - stop once the relative reduction of `S` falls below the tolerance and
//!   the remaining Gauss–Newton step is negligible
//!
//! The solver is started from each self-start candidate in turn (lowest
//! initial SSE first) until one converges.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{ModelKind, Observation};
use crate::error::CurveError;
use crate::fit::start::starting_values;
use crate::math::{InverseError, normal_matrix_inverse};
use crate::models::{fill_gradient_row, is_admissible, predict};

/// Initial Marquardt damping.
const LAMBDA_INIT: f64 = 1e-3;
/// Damping bounds; exceeding `LAMBDA_MAX` means no downhill step exists.
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Damping update factor.
const LAMBDA_STEP: f64 = 10.0;
/// Floor for `diag(JᵀJ)` so a flat column still gets damped.
const DIAG_FLOOR: f64 = 1e-12;
/// Relative-offset level under which the current point counts as a minimum.
const OFFSET_TOL: f64 = 1e-3;
/// `S(θ) / Σy²` below this is an exact fit.
const EXACT_FIT_RATIO: f64 = 1e-24;
/// How many start candidates are tried before giving up.
const MAX_STARTS: usize = 8;

/// Solver options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Cap on accepted + rejected outer iterations.
    pub max_iterations: usize,
    /// Convergence threshold on `(S_old − S_new) / S_old`.
    ///
    /// Not the only stop condition: once the reduction drops below this, the
    /// solver also requires the Bates–Watts relative offset (the remaining
    /// Gauss–Newton step measured against the residual noise) to be under
    /// `1e-3`, and keeps iterating otherwise. A loose tolerance therefore
    /// does not stop the solver early far from the minimum.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-8,
        }
    }
}

/// Raw least-squares solution for a single model kind.
#[derive(Debug, Clone)]
pub struct ModelFit {
    pub model: ModelKind,
    pub theta: Vec<f64>,
    /// `μ(x_i; θ̂)`
    pub fitted: Vec<f64>,
    pub rss: f64,
    /// `(JᵀJ)⁻¹` at `θ̂` (unscaled by `σ̂²`).
    pub jtj_inverse: DMatrix<f64>,
    pub iterations: usize,
}

#[derive(Debug, Clone)]
struct Solution {
    theta: DVector<f64>,
    rss: f64,
    iterations: usize,
}

/// Fit a single model kind by nonlinear least squares.
pub fn fit_model(
    model: ModelKind,
    observations: &[Observation],
    opts: &FitOptions,
) -> Result<ModelFit, CurveError> {
    let n = observations.len();
    let p = model.param_count();
    if n <= p {
        return Err(CurveError::EmptyDataset {
            found: n,
            required: p + 1,
        });
    }

    let x: Vec<f64> = observations.iter().map(Observation::x_f64).collect();
    let y: Vec<f64> = observations.iter().map(|o| o.y).collect();

    // Rank candidates by their initial SSE; deterministic tie-break on index.
    let mut candidates: Vec<(usize, Vec<f64>, f64)> = starting_values(model, &x, &y)
        .into_iter()
        .enumerate()
        .filter_map(|(idx, theta)| sse(model, &x, &y, &theta).map(|s| (idx, theta, s)))
        .collect();
    candidates.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)));

    if candidates.is_empty() {
        return Err(CurveError::convergence(
            model,
            "no admissible starting values with finite residuals",
        ));
    }

    let mut last_reason = String::new();
    for (idx, start, start_sse) in candidates.into_iter().take(MAX_STARTS) {
        debug!(model = %model, candidate = idx, ?start, start_sse, "starting Levenberg-Marquardt");
        match levenberg_marquardt(model, &x, &y, &start, opts) {
            Ok(solution) => return finalize(model, &x, solution),
            Err(reason) => {
                debug!(model = %model, candidate = idx, %reason, "start candidate failed");
                last_reason = reason;
            }
        }
    }

    Err(CurveError::convergence(model, last_reason))
}

fn finalize(model: ModelKind, x: &[f64], solution: Solution) -> Result<ModelFit, CurveError> {
    let theta: Vec<f64> = solution.theta.iter().copied().collect();
    let jacobian = jacobian(model, x, &theta);
    let jtj_inverse = normal_matrix_inverse(&jacobian).map_err(|e| match e {
        InverseError::RankDeficient { .. } => CurveError::singular(model, e.to_string()),
        InverseError::NonFinite => CurveError::convergence(model, e.to_string()),
    })?;

    let fitted = x.iter().map(|&xi| predict(model, xi, &theta)).collect();
    Ok(ModelFit {
        model,
        theta,
        fitted,
        rss: solution.rss,
        jtj_inverse,
        iterations: solution.iterations,
    })
}

fn levenberg_marquardt(
    model: ModelKind,
    x: &[f64],
    y: &[f64],
    start: &[f64],
    opts: &FitOptions,
) -> Result<Solution, String> {
    let n = x.len();
    let p = start.len();
    let y_scale: f64 = y.iter().map(|v| v * v).sum::<f64>().max(f64::MIN_POSITIVE);

    let mut theta = DVector::from_column_slice(start);
    let mut resid = residuals(model, x, y, theta.as_slice())
        .ok_or_else(|| "non-finite residuals at starting values".to_string())?;
    let mut rss = resid.norm_squared();
    let mut lambda = LAMBDA_INIT;
    let mut accepted_steps = 0usize;

    for iter in 1..=opts.max_iterations {
        if rss <= EXACT_FIT_RATIO * y_scale {
            return Ok(Solution { theta, rss, iterations: accepted_steps });
        }

        let jac = jacobian(model, x, theta.as_slice());
        if jac.iter().any(|v| !v.is_finite()) {
            return Err(format!("non-finite Jacobian at iteration {iter}"));
        }
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &resid;

        let mut step = None;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for j in 0..p {
                damped[(j, j)] += lambda * jtj[(j, j)].max(DIAG_FLOOR);
            }
            if let Some(chol) = damped.cholesky() {
                let delta = chol.solve(&grad);
                let trial = &theta + &delta;
                if is_admissible(model, trial.as_slice()) {
                    if let Some(trial_resid) = residuals(model, x, y, trial.as_slice()) {
                        let trial_rss = trial_resid.norm_squared();
                        if trial_rss < rss {
                            step = Some((trial, trial_resid, trial_rss));
                            break;
                        }
                    }
                }
            }
            lambda *= LAMBDA_STEP;
        }

        let Some((trial, trial_resid, trial_rss)) = step else {
            // No downhill step at any damping: either we sit on the minimum up to
            // rounding, or the problem is stuck.
            let offset = relative_offset(&jtj, &grad, rss, n, p);
            if offset < OFFSET_TOL {
                return Ok(Solution { theta, rss, iterations: accepted_steps });
            }
            return Err(format!(
                "no downhill step after {accepted_steps} iterations (relative offset {offset:.3e})"
            ));
        };

        let reduction = (rss - trial_rss) / rss;
        theta = trial;
        resid = trial_resid;
        rss = trial_rss;
        accepted_steps += 1;
        lambda = (lambda / LAMBDA_STEP).max(LAMBDA_MIN);
        debug!(model = %model, iter, rss, lambda, reduction, "accepted step");

        // A small reduction alone can come from heavy damping far from the
        // minimum; also require the Gauss-Newton step to be negligible.
        if reduction < opts.tolerance {
            let jac = jacobian(model, x, theta.as_slice());
            let offset = relative_offset(&(jac.transpose() * &jac), &(jac.transpose() * &resid), rss, n, p);
            if offset < OFFSET_TOL {
                return Ok(Solution { theta, rss, iterations: accepted_steps });
            }
        }
    }

    Err(format!(
        "no convergence within {} iterations (tolerance {:e})",
        opts.max_iterations, opts.tolerance
    ))
}

/// Bates–Watts relative offset: size of the remaining Gauss–Newton
/// improvement relative to the residual noise level.
fn relative_offset(jtj: &DMatrix<f64>, grad: &DVector<f64>, rss: f64, n: usize, p: usize) -> f64 {
    let Some(chol) = jtj.clone().cholesky() else {
        return f64::INFINITY;
    };
    let projected = grad.dot(&chol.solve(grad)).max(0.0);
    let remaining = (rss - projected).max(f64::MIN_POSITIVE);
    let df = n.saturating_sub(p).max(1) as f64;
    let offset = ((projected / p as f64) / (remaining / df)).sqrt();
    if offset.is_finite() { offset } else { f64::INFINITY }
}

/// `n × p` Jacobian of `μ` with respect to `θ`.
pub fn jacobian(model: ModelKind, x: &[f64], theta: &[f64]) -> DMatrix<f64> {
    let p = model.param_count();
    let mut jac = DMatrix::<f64>::zeros(x.len(), p);
    let mut row = vec![0.0; p];
    for (i, &xi) in x.iter().enumerate() {
        fill_gradient_row(model, xi, theta, &mut row);
        for j in 0..p {
            jac[(i, j)] = row[j];
        }
    }
    jac
}

/// `y − μ(x; θ)`, or `None` if any residual is non-finite.
fn residuals(model: ModelKind, x: &[f64], y: &[f64], theta: &[f64]) -> Option<DVector<f64>> {
    let r = DVector::from_iterator(
        x.len(),
        x.iter().zip(y).map(|(&xi, &yi)| yi - predict(model, xi, theta)),
    );
    if r.iter().all(|v| v.is_finite()) { Some(r) } else { None }
}

fn sse(model: ModelKind, x: &[f64], y: &[f64], theta: &[f64]) -> Option<f64> {
    residuals(model, x, y, theta).map(|r| r.norm_squared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn observations(y: &[f64]) -> Vec<Observation> {
        let d0 = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        y.iter()
            .enumerate()
            .map(|(i, &yi)| Observation {
                x: i as u32 + 1,
                date: d0 + chrono::Duration::days(i as i64),
                y: yi,
            })
            .collect()
    }

    #[test]
    fn recovers_exact_exponential() {
        let y: Vec<f64> = (1..=15).map(|x| 100.0 * (0.3 * x as f64).exp()).collect();
        let fit = fit_model(ModelKind::Exponential, &observations(&y), &FitOptions::default()).unwrap();
        assert!((fit.theta[0] - 100.0).abs() < 1e-6);
        assert!((fit.theta[1] - 0.3).abs() < 1e-9);
        assert!(fit.rss < 1e-12 * y.iter().map(|v| v * v).sum::<f64>());
    }

    #[test]
    fn rounded_exponential_within_tolerance() {
        let y: Vec<f64> = (1..=15).map(|x| (100.0 * (0.3 * x as f64).exp()).round()).collect();
        let fit = fit_model(ModelKind::Exponential, &observations(&y), &FitOptions::default()).unwrap();
        assert!((fit.theta[1] - 0.3).abs() / 0.3 < 0.01, "rate={}", fit.theta[1]);
        assert!((fit.theta[0] - 100.0).abs() / 100.0 < 0.05, "scale={}", fit.theta[0]);
        assert!(fit.rss >= 0.0);
    }

    #[test]
    fn fits_exact_logistic_and_gompertz() {
        let x: Vec<f64> = (1..=40).map(f64::from).collect();
        let logis: Vec<f64> = x.iter().map(|&v| predict(ModelKind::Logistic, v, &[5000.0, 20.0, 3.0])).collect();
        let fit = fit_model(ModelKind::Logistic, &observations(&logis), &FitOptions::default()).unwrap();
        assert!((fit.theta[0] - 5000.0).abs() < 1e-3);
        assert!((fit.theta[1] - 20.0).abs() < 1e-6);
        assert!((fit.theta[2] - 3.0).abs() < 1e-6);

        let gomp: Vec<f64> = x.iter().map(|&v| predict(ModelKind::Gompertz, v, &[5000.0, 8.0, 0.85])).collect();
        let fit = fit_model(ModelKind::Gompertz, &observations(&gomp), &FitOptions::default()).unwrap();
        assert!((fit.theta[0] - 5000.0).abs() / 5000.0 < 1e-4);
        assert!((fit.theta[2] - 0.85).abs() < 1e-4);
    }

    #[test]
    fn too_few_points_is_empty_dataset() {
        let err = fit_model(ModelKind::Logistic, &observations(&[1.0, 2.0, 3.0]), &FitOptions::default())
            .unwrap_err();
        assert_eq!(err, CurveError::EmptyDataset { found: 3, required: 4 });
    }

    #[test]
    fn all_zero_counts_fail_to_converge() {
        let err = fit_model(ModelKind::Gompertz, &observations(&[0.0; 10]), &FitOptions::default())
            .unwrap_err();
        assert!(matches!(err, CurveError::Convergence { model: ModelKind::Gompertz, .. }));
    }

    #[test]
    fn iteration_cap_is_enforced() {
        let x: Vec<f64> = (1..=40).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| predict(ModelKind::Logistic, v, &[5000.0, 20.0, 3.0]) + if v as i64 % 2 == 0 { 15.0 } else { -15.0 })
            .collect();
        let opts = FitOptions {
            max_iterations: 1,
            tolerance: 1e-300,
        };
        let err = fit_model(ModelKind::Logistic, &observations(&y), &opts).unwrap_err();
        assert!(matches!(err, CurveError::Convergence { .. }));
    }

    #[test]
    fn loose_tolerance_still_stops_at_the_minimum() {
        let x: Vec<f64> = (1..=40).map(f64::from).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| predict(ModelKind::Logistic, v, &[5000.0, 20.0, 3.0]) + if v as i64 % 2 == 0 { 15.0 } else { -15.0 })
            .collect();
        let obs = observations(&y);

        let tight = fit_model(ModelKind::Logistic, &obs, &FitOptions::default()).unwrap();
        let loose = fit_model(
            ModelKind::Logistic,
            &obs,
            &FitOptions {
                max_iterations: 200,
                tolerance: 0.5,
            },
        )
        .unwrap();

        let s2 = tight.rss / (40 - 3) as f64;
        for j in 0..3 {
            let se = (s2 * tight.jtj_inverse[(j, j)]).sqrt();
            assert!(
                (loose.theta[j] - tight.theta[j]).abs() < 0.05 * se,
                "param {j}: {} vs {} (se {se})",
                loose.theta[j],
                tight.theta[j]
            );
        }
        assert!(loose.rss <= tight.rss * (1.0 + 1e-4));
    }

    #[test]
    fn jacobian_has_one_row_per_point() {
        let jac = jacobian(ModelKind::Gompertz, &[1.0, 2.0, 3.0, 4.0], &[10.0, 1.0, 0.5]);
        assert_eq!(jac.nrows(), 4);
        assert_eq!(jac.ncols(), 3);
    }
}
