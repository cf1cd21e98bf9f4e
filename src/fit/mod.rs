//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate self-starting parameter candidates per model (`start`)
//! - run Levenberg–Marquardt from the best candidates (`fitter`)
//! - compute goodness-of-fit and rank models by AIC (`selection`)

pub mod fitter;
pub mod selection;
pub mod start;

pub use fitter::*;
pub use selection::*;
pub use start::*;
