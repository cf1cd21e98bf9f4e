//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - forecast table export to CSV (`export`)
//! - report JSON read/write (`report_file`)

pub mod export;
pub mod ingest;
pub mod report_file;

pub use export::*;
pub use ingest::*;
pub use report_file::*;
