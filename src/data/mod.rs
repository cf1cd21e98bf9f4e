//! Data sources.
//!
//! - remote or local CSV text (`source`)
//! - seeded synthetic series for offline runs and tests (`synthetic`)

pub mod source;
pub mod synthetic;

pub use source::*;
pub use synthetic::*;
