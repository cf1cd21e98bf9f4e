//! Starting values for the nonlinear fits.
//!
//! Each model gets a small deterministic set of candidate `θ` vectors built
//! from linearizations of the mean function:
//!
//! - exponential: `log y = log θ1 + θ2·x` (full range and late half)
//! - logistic: asymptote `m·max(y)`, inflection at the `θ1/2` crossing with the
//!   scale from the local slope there (`μ'(θ2) = θ1 / (4θ3)`), plus a
//!   `logit(y/θ1) = (x − θ2)/θ3` regression
//! - Gompertz: asymptote `m·max(y)`, then `log(−log(y/θ1)) = log θ2 + x·log θ3`
//!   on the full range and on the early/late halves
//!
//! The asymptote multipliers cover series that are still far from saturation,
//! where `max(y)` badly underestimates the plateau. Candidates outside the
//! model's parameter domain are dropped; the fitter ranks the rest by SSE.

use crate::domain::ModelKind;
use crate::math::linear_fit;
use crate::models::is_admissible;

/// Asymptote guesses as multiples of `max(y)`.
pub const ASYMPTOTE_MULTIPLIERS: [f64; 4] = [1.05, 1.5, 2.0, 3.0];

/// Build admissible starting-value candidates for `model`.
///
/// `x` and `y` must have equal length. The result may be empty when the data
/// carries no usable signal (e.g. all-zero counts).
pub fn starting_values(model: ModelKind, x: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
    let candidates = match model {
        ModelKind::Exponential => exponential_starts(x, y),
        ModelKind::Logistic => logistic_starts(x, y),
        ModelKind::Gompertz => gompertz_starts(x, y),
    };
    candidates
        .into_iter()
        .filter(|theta| is_admissible(model, theta))
        .collect()
}

fn exponential_starts(x: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
    let (px, ly) = positive_log_pairs(x, y);
    let mut out = Vec::new();
    for (sx, sy) in [(&px[..], &ly[..]), late_half(&px, &ly)] {
        if let Some((a, b)) = linear_fit(sx, sy) {
            out.push(vec![a.exp(), b]);
        }
    }
    out
}

fn logistic_starts(x: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
    let Some(y_max) = max_positive(y) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for m in ASYMPTOTE_MULTIPLIERS {
        let asym = m * y_max;

        if let Some((xmid, slope)) = half_crossing(x, y, asym / 2.0) {
            if slope > 0.0 {
                out.push(vec![asym, xmid, asym / (4.0 * slope)]);
            }
        }

        // logit(y/asym) = (x - xmid) / scal
        let mut lx = Vec::new();
        let mut lz = Vec::new();
        for (&xi, &yi) in x.iter().zip(y) {
            if yi > 0.0 && yi < asym {
                lx.push(xi);
                lz.push((yi / (asym - yi)).ln());
            }
        }
        if let Some((a, b)) = linear_fit(&lx, &lz) {
            if b > 0.0 {
                out.push(vec![asym, -a / b, 1.0 / b]);
            }
        }
    }
    out
}

fn gompertz_starts(x: &[f64], y: &[f64]) -> Vec<Vec<f64>> {
    let Some(y_max) = max_positive(y) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    for m in ASYMPTOTE_MULTIPLIERS {
        let asym = m * y_max;

        // log(-log(y/asym)) = log(b2) + x·log(b3)
        let mut gx = Vec::new();
        let mut gz = Vec::new();
        for (&xi, &yi) in x.iter().zip(y) {
            if yi > 0.0 && yi < asym {
                let inner = -(yi / asym).ln();
                if inner > 0.0 {
                    gx.push(xi);
                    gz.push(inner.ln());
                }
            }
        }

        let segments = [(&gx[..], &gz[..]), early_half(&gx, &gz), late_half(&gx, &gz)];
        for (sx, sz) in segments {
            if let Some((a, b)) = linear_fit(sx, sz) {
                out.push(vec![asym, a.exp(), b.exp()]);
            }
        }
    }
    out
}

/// Locate where `y` first reaches `level`, returning the interpolated `x` and the
/// local slope `dy/dx` around that point.
fn half_crossing(x: &[f64], y: &[f64], level: f64) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let k = y[..n].iter().position(|&v| v >= level)?;

    let xmid = if k == 0 {
        x[0]
    } else {
        let (x0, y0, x1, y1) = (x[k - 1], y[k - 1], x[k], y[k]);
        if (y1 - y0).abs() < f64::EPSILON {
            x1
        } else {
            x0 + (level - y0) * (x1 - x0) / (y1 - y0)
        }
    };

    // Central difference where possible, one-sided at the edges.
    let lo = k.saturating_sub(1);
    let hi = (k + 1).min(n - 1);
    let dx = x[hi] - x[lo];
    if dx <= 0.0 {
        return None;
    }
    let slope = (y[hi] - y[lo]) / dx;
    if xmid.is_finite() && slope.is_finite() {
        Some((xmid, slope))
    } else {
        None
    }
}

fn positive_log_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter(|(_, yi)| **yi > 0.0)
        .map(|(&xi, &yi)| (xi, yi.ln()))
        .unzip()
}

fn max_positive(y: &[f64]) -> Option<f64> {
    let m = y.iter().copied().filter(|v| v.is_finite()).fold(f64::NEG_INFINITY, f64::max);
    if m > 0.0 { Some(m) } else { None }
}

fn early_half<'a>(x: &'a [f64], y: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let mid = x.len().div_ceil(2);
    (&x[..mid], &y[..mid])
}

fn late_half<'a>(x: &'a [f64], y: &'a [f64]) -> (&'a [f64], &'a [f64]) {
    let mid = x.len() / 2;
    (&x[mid..], &y[mid..])
}
