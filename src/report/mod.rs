//! Plain-text reporting of comparisons and forecasts.

pub mod format;

pub use format::*;
