//! Model evaluation for the exponential / logistic / Gompertz curves.
//!
//! The fitter and the forecaster rely on three primitive operations:
//! - predict `μ(x; θ)` (for residuals, forecasts and plots)
//! - fill a gradient row `∂μ/∂θ` at `x` (Jacobian rows and the delta method)
//! - check whether `θ` lies in the model's parameter domain
//!
//! Gradients are analytic. Nothing here clamps `exp`: an overflowing
//! evaluation returns a non-finite value and callers decide what to do.

use crate::domain::ModelKind;

/// Predict `μ(x; θ)` for the given model kind.
///
/// # Panics
/// Panics if `theta` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, theta: &[f64]) -> f64 {
    match model {
        ModelKind::Exponential => theta[0] * (theta[1] * x).exp(),
        ModelKind::Logistic => theta[0] / (1.0 + ((theta[1] - x) / theta[2]).exp()),
        ModelKind::Gompertz => theta[0] * (-theta[1] * theta[2].powf(x)).exp(),
    }
}

/// Fill `out` with `∂μ/∂θ_j` at `x`.
///
/// # Panics
/// Panics if `out` or `theta` is shorter than `model.param_count()`.
pub fn fill_gradient_row(model: ModelKind, x: f64, theta: &[f64], out: &mut [f64]) {
    match model {
        ModelKind::Exponential => {
            let e = (theta[1] * x).exp();
            out[0] = e;
            out[1] = theta[0] * x * e;
        }
        ModelKind::Logistic => {
            let (asym, xmid, scal) = (theta[0], theta[1], theta[2]);
            let z = (xmid - x) / scal;
            // With s = 1/(1+e^z): ∂s/∂z = -s(1-s). Written this way so that a large
            // `z` gives 0 instead of inf/inf.
            let s = 1.0 / (1.0 + z.exp());
            let ds = s * (1.0 - s);
            out[0] = s;
            out[1] = -asym * ds / scal;
            out[2] = asym * ds * z / scal;
        }
        ModelKind::Gompertz => {
            let (asym, b2, b3) = (theta[0], theta[1], theta[2]);
            let p = b3.powf(x);
            let g = (-b2 * p).exp();
            out[0] = g;
            out[1] = -asym * p * g;
            // d(b3^x)/d(b3) = x·b3^(x-1) = x·p/b3
            out[2] = -asym * b2 * x * (p / b3) * g;
        }
    }
}

/// Whether `θ` lies inside the parameter domain the model is defined on.
///
/// - exponential: `θ1 > 0`
/// - logistic: `θ1 > 0`, `θ3 > 0`
/// - Gompertz: `θ1 > 0`, `θ2 > 0`, `0 < θ3 < 1`
pub fn is_admissible(model: ModelKind, theta: &[f64]) -> bool {
    if theta.len() != model.param_count() || theta.iter().any(|v| !v.is_finite()) {
        return false;
    }
    match model {
        ModelKind::Exponential => theta[0] > 0.0,
        ModelKind::Logistic => theta[0] > 0.0 && theta[2] > 0.0,
        ModelKind::Gompertz => theta[0] > 0.0 && theta[1] > 0.0 && theta[2] > 0.0 && theta[2] < 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXP: [f64; 2] = [100.0, 0.3];
    const LOGIS: [f64; 3] = [5000.0, 20.0, 3.0];
    const GOMP: [f64; 3] = [5000.0, 8.0, 0.85];

    fn theta_for(kind: ModelKind) -> &'static [f64] {
        match kind {
            ModelKind::Exponential => &EXP,
            ModelKind::Logistic => &LOGIS,
            ModelKind::Gompertz => &GOMP,
        }
    }

    #[test]
    fn predict_known_values() {
        assert!((predict(ModelKind::Exponential, 0.0, &EXP) - 100.0).abs() < 1e-12);
        // Logistic at its inflection is half the asymptote.
        assert!((predict(ModelKind::Logistic, 20.0, &LOGIS) - 2500.0).abs() < 1e-9);
        // Gompertz at x=0 is asym·exp(-b2).
        let g0 = predict(ModelKind::Gompertz, 0.0, &GOMP);
        assert!((g0 - 5000.0 * (-8.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn analytic_gradient_matches_central_differences() {
        for kind in ModelKind::ALL {
            let theta = theta_for(kind);
            for &x in &[1.0, 7.5, 20.0, 33.0] {
                let mut grad = vec![0.0; kind.param_count()];
                fill_gradient_row(kind, x, theta, &mut grad);
                for j in 0..theta.len() {
                    let h = 1e-6 * theta[j].abs().max(1e-3);
                    let mut up = theta.to_vec();
                    let mut dn = theta.to_vec();
                    up[j] += h;
                    dn[j] -= h;
                    let fd = (predict(kind, x, &up) - predict(kind, x, &dn)) / (2.0 * h);
                    let tol = 1e-5 * fd.abs().max(1.0);
                    assert!(
                        (grad[j] - fd).abs() < tol,
                        "{kind} x={x} j={j}: analytic={} fd={fd}",
                        grad[j]
                    );
                }
            }
        }
    }

    #[test]
    fn logistic_is_bounded_and_increasing() {
        let mut prev = 0.0;
        for i in -50..=120 {
            let x = i as f64 * 0.5;
            let y = predict(ModelKind::Logistic, x, &LOGIS);
            assert!(y > 0.0 && y < LOGIS[0], "x={x} y={y}");
            assert!(y >= prev);
            prev = y;
        }
    }

    #[test]
    fn gompertz_is_bounded_and_increasing() {
        let mut prev = 0.0;
        for x in 0..=200 {
            let y = predict(ModelKind::Gompertz, x as f64, &GOMP);
            assert!(y <= GOMP[0]);
            assert!(y >= prev);
            prev = y;
        }
    }

    #[test]
    fn logistic_gradient_stays_finite_far_from_inflection() {
        let mut grad = [0.0; 3];
        fill_gradient_row(ModelKind::Logistic, -5000.0, &LOGIS, &mut grad);
        assert!(grad.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn admissibility_rules() {
        assert!(is_admissible(ModelKind::Exponential, &EXP));
        assert!(!is_admissible(ModelKind::Exponential, &[-1.0, 0.3]));
        assert!(!is_admissible(ModelKind::Logistic, &[5000.0, 20.0, -3.0]));
        assert!(is_admissible(ModelKind::Gompertz, &GOMP));
        assert!(!is_admissible(ModelKind::Gompertz, &[5000.0, 8.0, 1.2]));
        assert!(!is_admissible(ModelKind::Gompertz, &[5000.0, 8.0]));
        assert!(!is_admissible(ModelKind::Logistic, &[f64::NAN, 20.0, 3.0]));
    }
}
