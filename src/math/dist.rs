//! Student-t critical values for two-sided intervals.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Critical value `t_{1-α/2, df}` for a two-sided interval at `confidence = 1 - α`.
///
/// Returns `None` for `df == 0`, a confidence outside `(0, 1)`, or a
/// non-finite quantile.
pub fn t_critical(confidence: f64, df: usize) -> Option<f64> {
    if df == 0 || !(confidence.is_finite() && confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df as f64).ok()?;
    let q = dist.inverse_cdf(0.5 + confidence / 2.0);
    if q.is_finite() && q > 0.0 { Some(q) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_quantiles() {
        // qt(0.975, 10) = 2.228139, qt(0.975, 1) = 12.7062, qt(0.95, 30) = 1.697261
        assert!((t_critical(0.95, 10).unwrap() - 2.228139).abs() < 1e-4);
        assert!((t_critical(0.95, 1).unwrap() - 12.7062).abs() < 1e-3);
        assert!((t_critical(0.90, 30).unwrap() - 1.697261).abs() < 1e-4);
    }

    #[test]
    fn shrinks_towards_normal_with_many_df() {
        let q = t_critical(0.95, 100_000).unwrap();
        assert!((q - 1.959964).abs() < 1e-3);
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(t_critical(0.95, 0).is_none());
        assert!(t_critical(1.0, 5).is_none());
        assert!(t_critical(0.0, 5).is_none());
    }
}
