use thiserror::Error;

use crate::domain::ModelKind;

/// Application-level error carried to the process boundary.
///
/// The binary prints the message and exits with `exit_code`:
/// 2 = input/config, 3 = insufficient data, 4 = numerical or I/O failure.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures raised by the loader and the curve fitter.
///
/// Loader errors abort the run (there is nothing to fit). Fitter errors are
/// scoped to a single model: the comparison step records them as failure
/// notes and keeps reporting the models that did fit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurveError {
    /// A row is missing a required field or holds an unparseable value.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// Too few observations to fit a 3-parameter model with a spare degree of freedom.
    #[error("Dataset too small: {found} observations (need at least {required})")]
    EmptyDataset { found: usize, required: usize },

    /// The optimizer hit its iteration cap, stalled, or only produced non-finite residuals.
    #[error("{model} fit did not converge: {reason}")]
    Convergence { model: ModelKind, reason: String },

    /// `JᵀJ` at the solution is not invertible, so no parameter covariance exists.
    #[error("{model} fit has a singular Jacobian: {reason}")]
    SingularJacobian { model: ModelKind, reason: String },
}

impl CurveError {
    pub fn convergence(model: ModelKind, reason: impl Into<String>) -> Self {
        CurveError::Convergence {
            model,
            reason: reason.into(),
        }
    }

    pub fn singular(model: ModelKind, reason: impl Into<String>) -> Self {
        CurveError::SingularJacobian {
            model,
            reason: reason.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            CurveError::DataFormat(_) => 2,
            CurveError::EmptyDataset { .. } => 3,
            CurveError::Convergence { .. } | CurveError::SingularJacobian { .. } => 4,
        }
    }
}

impl From<CurveError> for AppError {
    fn from(err: CurveError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_errors_map_to_exit_codes() {
        let err: AppError = CurveError::DataFormat("bad date".to_string()).into();
        assert_eq!(err.exit_code(), 2);

        let err: AppError = CurveError::EmptyDataset { found: 2, required: 4 }.into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("2 observations"));

        let err: AppError = CurveError::convergence(ModelKind::Gompertz, "stalled").into();
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.to_string(), "Gompertz fit did not converge: stalled");
    }
}
