//! CSV ingest and normalization.
//!
//! Turns a daily cumulative-count CSV into the `Observation` sequence the
//! fitter works on.
//!
//! Design goals:
//! - **Strict schema**: a missing column, an empty field, an unparseable date
//!   or count, a negative count or a repeated date is a `DataFormat` error
//!   naming the line
//! - **Order-independent**: rows are sorted by date before indexing
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDate;
use csv::StringRecord;
use tracing::info;

use crate::domain::{DailyRecord, DatasetStats, InputSpec, MIN_OBSERVATIONS, Observation};
use crate::error::CurveError;

/// Date formats tried in order when no explicit format is configured.
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

/// Ingest output: indexed observations + stats + row counts.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: Vec<Observation>,
    pub stats: DatasetStats,
    /// Data rows in the source.
    pub rows_read: usize,
    /// Rows left after the date window.
    pub rows_used: usize,
}

/// Parse a CSV stream into observations.
pub fn load_observations<R: Read>(reader: R, spec: &InputSpec) -> Result<IngestedData, CurveError> {
    let records = read_daily_records(reader, spec)?;
    observations_from_records(records, spec)
}

/// Parse every data row into a `DailyRecord`, in file order.
pub fn read_daily_records<R: Read>(reader: R, spec: &InputSpec) -> Result<Vec<DailyRecord>, CurveError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| CurveError::DataFormat(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let date_idx = column_index(&header_map, &spec.date_column)?;
    let count_idx = column_index(&header_map, &spec.count_column)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| CurveError::DataFormat(format!("line {line}: CSV parse error: {e}")))?;

        let raw_date = get_required(&record, date_idx, &spec.date_column)
            .map_err(|e| CurveError::DataFormat(format!("line {line}: {e}")))?;
        let raw_count = get_required(&record, count_idx, &spec.count_column)
            .map_err(|e| CurveError::DataFormat(format!("line {line}: {e}")))?;

        let date = parse_date(raw_date, spec.date_format.as_deref())
            .map_err(|e| CurveError::DataFormat(format!("line {line}: {e}")))?;
        let y = parse_count(raw_count).map_err(|e| CurveError::DataFormat(format!("line {line}: {e}")))?;

        records.push(DailyRecord { date, y });
    }
    Ok(records)
}

/// Sort, window and index daily records.
///
/// `x` is the day offset from the first kept date plus one, so gaps in the
/// calendar show up as gaps in `x`.
pub fn observations_from_records(
    mut records: Vec<DailyRecord>,
    spec: &InputSpec,
) -> Result<IngestedData, CurveError> {
    let rows_read = records.len();
    records.sort_by_key(|r| r.date);

    if let Some(pair) = records.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(CurveError::DataFormat(format!("duplicate date {}", pair[0].date)));
    }

    records.retain(|r| spec.start.is_none_or(|s| r.date >= s) && spec.end.is_none_or(|e| r.date <= e));
    let rows_used = records.len();

    if rows_used < MIN_OBSERVATIONS {
        return Err(CurveError::EmptyDataset {
            found: rows_used,
            required: MIN_OBSERVATIONS,
        });
    }

    let first = records[0].date;
    let mut observations = Vec::with_capacity(rows_used);
    for r in records {
        let offset = (r.date - first).num_days() + 1;
        let x = u32::try_from(offset)
            .map_err(|_| CurveError::DataFormat(format!("date {} is too far from {first}", r.date)))?;
        observations.push(Observation { x, date: r.date, y: r.y });
    }

    let stats = compute_stats(&observations).ok_or_else(|| CurveError::EmptyDataset {
        found: 0,
        required: MIN_OBSERVATIONS,
    })?;
    info!(
        rows_read,
        rows_used,
        first = %stats.date_min,
        last = %stats.date_max,
        "loaded observations"
    );

    Ok(IngestedData {
        observations,
        stats,
        rows_read,
        rows_used,
    })
}

pub fn compute_stats(observations: &[Observation]) -> Option<DatasetStats> {
    let first = observations.first()?;
    let last = observations.last()?;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for o in observations {
        y_min = y_min.min(o.y);
        y_max = y_max.max(o.y);
    }

    Some(DatasetStats {
        n: observations.len(),
        x_min: first.x,
        x_max: last.x,
        date_min: first.date,
        date_max: last.date,
        y_min,
        y_max,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins for repeated headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn column_index(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, CurveError> {
    header_map
        .get(&normalize_header_name(name))
        .copied()
        .ok_or_else(|| CurveError::DataFormat(format!("Missing required column: `{name}`")))
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_date(s: &str, format: Option<&str>) -> Result<NaiveDate, String> {
    if let Some(fmt) = format {
        return NaiveDate::parse_from_str(s, fmt).map_err(|e| format!("Invalid date '{s}' for format '{fmt}': {e}"));
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    Err(format!(
        "Invalid date '{s}'. Expected one of: YYYY-MM-DD, MM/DD/YYYY, YYYY/MM/DD, DD.MM.YYYY."
    ))
}

fn parse_count(s: &str) -> Result<f64, String> {
    let v = s
        .parse::<f64>()
        .map_err(|_| format!("Invalid count '{s}'."))?;
    if !v.is_finite() {
        return Err(format!("Count '{s}' is not finite."));
    }
    if v < 0.0 {
        return Err(format!("Count '{s}' is negative."));
    }
    Ok(v)
}
