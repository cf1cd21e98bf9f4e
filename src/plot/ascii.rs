//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed points: `o`
//! - fitted / forecast curve: `-` line
//! - prediction interval bounds: `:` (only rows with a valid interval)

use crate::domain::{ForecastTable, ModelKind, Observation, ReportFile};
use crate::error::AppError;

/// Render observations with one model's forecast table.
pub fn render_ascii_plot(observations: &[Observation], table: &ForecastTable, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let curve: Vec<(f64, f64)> = table.rows.iter().map(|r| (f64::from(r.x), r.fit)).collect();
    let lower: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter(|r| r.interval_valid)
        .map(|r| (f64::from(r.x), r.lower))
        .collect();
    let upper: Vec<(f64, f64)> = table
        .rows
        .iter()
        .filter(|r| r.interval_valid)
        .map(|r| (f64::from(r.x), r.upper))
        .collect();
    let points: Vec<(f64, f64)> = observations.iter().map(|o| (o.x_f64(), o.y)).collect();

    let (x_min, x_max) = range(points.iter().chain(&curve).map(|p| p.0)).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = range(points.iter().chain(&curve).chain(&lower).chain(&upper).map(|p| p.1))
        .unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then bounds into the remaining blanks, then points on top.
    let frame = Frame {
        x_min,
        x_max,
        y_min,
        y_max,
    };
    draw_series(&mut grid, &curve, &frame, '-');
    draw_series(&mut grid, &lower, &frame, ':');
    draw_series(&mut grid, &upper, &frame, ':');
    for &(x, y) in &points {
        if !y.is_finite() {
            continue;
        }
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {} | x=[{x_min}, {x_max}] | y=[{y_min:.2}, {y_max:.2}]\n",
        table.model.display_name()
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    if !table.intervals_available() {
        out.push_str("(prediction interval unavailable for some rows)\n");
    }

    out
}

/// Render a plot from a saved report file.
///
/// `model = None` picks the lowest-AIC model recorded in the report.
pub fn render_from_report(
    report: &ReportFile,
    model: Option<ModelKind>,
    width: usize,
    height: usize,
) -> Result<String, AppError> {
    let kind = match model {
        Some(kind) => kind,
        None => report
            .comparison
            .ranking
            .first()
            .map(|r| r.kind)
            .ok_or_else(|| AppError::new(3, "Report contains no fitted model to plot."))?,
    };
    let table = report
        .forecasts
        .iter()
        .find(|t| t.model == kind)
        .ok_or_else(|| AppError::new(2, format!("Report has no forecast for the {kind} model.")))?;

    Ok(render_ascii_plot(&report.observations, table, width, height))
}

struct Frame {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

fn range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_series(grid: &mut [Vec<char>], series: &[(f64, f64)], frame: &Frame, ch: char) {
    let height = grid.len();
    let Some(width) = grid.first().map(Vec::len) else {
        return;
    };

    let mut prev = None;
    for &(x, y) in series {
        if !y.is_finite() {
            prev = None;
            continue;
        }
        let col = map_x(x, frame.x_min, frame.x_max, width);
        let row = map_y(y, frame.y_min, frame.y_max, height);
        match prev {
            Some((c0, r0)) => draw_line(grid, c0, r0, col, row, ch),
            None => {
                if grid[row][col] == ' ' {
                    grid[row][col] = ch;
                }
            }
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish). Only blank cells are painted.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
