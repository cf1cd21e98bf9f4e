//! `growth-curves` library crate.
//!
//! The binary (`growth`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the loader, fitter and forecaster can be used on their own
//!
//! Pipeline: `io::ingest` (observations) -> `fit` (Levenberg–Marquardt fits,
//! AIC ranking) -> `forecast` (delta-method prediction intervals) ->
//! `report` / `plot` / `io::export`.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod forecast;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
