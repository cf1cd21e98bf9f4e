//! Inversion of the Gauss–Newton normal matrix `JᵀJ`.
//!
//! We never form `JᵀJ` explicitly for the inverse. Instead we take the SVD of
//! the (tall) Jacobian `J = U Σ Vᵀ`, so that `(JᵀJ)⁻¹ = V Σ⁻² Vᵀ`. This squares
//! the singular values only once, at the end, and gives a direct rank check:
//! the smallest singular value relative to the largest.

use nalgebra::DMatrix;
use thiserror::Error;

/// Below this ratio `σ_min / σ_max` the Jacobian is treated as rank deficient.
pub const RCOND_MIN: f64 = 1e-10;

/// Why `(JᵀJ)⁻¹` could not be formed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InverseError {
    /// `σ_min / σ_max` fell below [`RCOND_MIN`] (or the Jacobian is all zero).
    #[error("JᵀJ is rank deficient (reciprocal condition of J = {rcond:.3e})")]
    RankDeficient { rcond: f64 },
    /// The Jacobian holds NaN/inf entries.
    #[error("Jacobian contains non-finite entries")]
    NonFinite,
}

/// Compute `(JᵀJ)⁻¹` for an `n × p` Jacobian with `n >= p`.
pub fn normal_matrix_inverse(jacobian: &DMatrix<f64>) -> Result<DMatrix<f64>, InverseError> {
    if jacobian.iter().any(|v| !v.is_finite()) {
        return Err(InverseError::NonFinite);
    }
    let p = jacobian.ncols();
    let svd = jacobian.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Err(InverseError::NonFinite);
    };

    let s = &svd.singular_values;
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let s_min = s.iter().copied().fold(f64::INFINITY, f64::min);
    let rcond = if s_max > 0.0 { s_min / s_max } else { 0.0 };
    if s.len() < p || !(rcond >= RCOND_MIN) {
        return Err(InverseError::RankDeficient { rcond });
    }

    // V Σ⁻² Vᵀ
    let mut scaled = v_t.transpose();
    for (j, mut col) in scaled.column_iter_mut().enumerate() {
        col /= s[j] * s[j];
    }
    let inv = scaled * v_t;
    if inv.iter().all(|v| v.is_finite()) {
        Ok(inv)
    } else {
        Err(InverseError::NonFinite)
    }
}
