//! Growth model implementations (exponential, logistic, Gompertz).
//!
//! Models are implemented as small, pure functions so that fitting and
//! forecasting code can stay generic over `ModelKind`.

pub mod model;

pub use model::*;
