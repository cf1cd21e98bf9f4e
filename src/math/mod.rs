//! Mathematical utilities: least squares, normal-matrix inversion and t quantiles.

pub mod dist;
pub mod linalg;
pub mod ols;

pub use dist::*;
pub use linalg::*;
pub use ols::*;
