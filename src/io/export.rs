//! Export forecast tables to CSV.
//!
//! One row per (model, day), meant to be easy to consume in spreadsheets or
//! downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::ForecastTable;
use crate::error::AppError;

/// Write every row of every forecast table to a CSV file.
pub fn write_forecast_csv(path: &Path, tables: &[ForecastTable]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_forecast_rows(&mut out, tables)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

fn write_forecast_rows<W: Write>(out: &mut W, tables: &[ForecastTable]) -> Result<(), AppError> {
    writeln!(out, "model,x,date,fit,lower,upper,interval_valid,confidence")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for table in tables {
        let model = format!("{:?}", table.model).to_lowercase();
        for r in &table.rows {
            writeln!(
                out,
                "{model},{},{},{:.6},{:.6},{:.6},{},{}",
                r.x, r.date, r.fit, r.lower, r.upper, r.interval_valid, table.confidence
            )
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        }
    }
    Ok(())
}
