//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - daily observations (`Observation`, `DailyRecord`) and their summary stats
//! - the growth model catalogue (`ModelKind`, `ModelSpec`)
//! - fit outputs (`FittedModel`, `FitMetrics`, `ModelComparison`)
//! - forecast outputs (`ForecastTable`, `ForecastRow`) and the saved report file

pub mod types;

pub use types::*;
