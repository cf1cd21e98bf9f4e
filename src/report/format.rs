//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (the tests below pin the layout)

use crate::domain::{DatasetStats, FitConfig, FittedModel, ForecastTable, ModelComparison};

/// Format the run header: source, data range and fit settings.
pub fn format_run_summary(source: &str, stats: &DatasetStats, config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== growth - Growth Curve Fit ===\n");
    out.push_str(&format!("Source: {source}\n"));
    out.push_str(&format!(
        "Data: n={} | dates=[{}, {}] | x=[{}, {}] | y=[{:.0}, {:.0}]\n",
        stats.n, stats.date_min, stats.date_max, stats.x_min, stats.x_max, stats.y_min, stats.y_max
    ));
    out.push_str(&format!(
        "Settings: confidence={} | horizon={}d | max-iter={} | tol={:e}\n",
        config.confidence, config.horizon, config.max_iterations, config.tolerance
    ));
    out.push('\n');

    out
}

/// Format the AIC ranking plus failure notes.
pub fn format_comparison(comparison: &ModelComparison) -> String {
    let mut out = String::new();

    out.push_str("Model comparison (ranked by AIC):\n");
    push_line(
        &mut out,
        format!(
            "  {:<12} {:>12} {:>12} {:>9} {:>8} {:>8}",
            "model", "AIC", "BIC", "dAIC", "weight", "R2"
        ),
    );
    push_line(
        &mut out,
        format!("  {:-<12} {:-<12} {:-<12} {:-<9} {:-<8} {:-<8}", "", "", "", "", "", ""),
    );
    for (i, r) in comparison.ranking.iter().enumerate() {
        let mark = if i == 0 { "*" } else { " " };
        push_line(
            &mut out,
            format!(
                "{mark} {:<12} {:>12.3} {:>12.3} {:>9.3} {:>8.4} {:>8.5}",
                r.kind.display_name(),
                r.aic,
                r.bic,
                r.delta_aic,
                r.akaike_weight,
                r.r_squared
            ),
        );
    }
    if comparison.ranking.is_empty() {
        out.push_str("  (no model fitted)\n");
    }
    for f in &comparison.failures {
        out.push_str(&format!("  (failed {}) {}\n", f.kind.display_name(), f.reason));
    }
    out.push('\n');

    out
}

/// Format one model's parameter estimates with standard errors.
pub fn format_fit_details(fit: &FittedModel) -> String {
    let mut out = String::new();
    let m = &fit.metrics;

    out.push_str(&format!(
        "{}: RSS={:.4e} sigma={:.4} df={} logLik={:.3} iterations={}\n",
        fit.kind.display_name(),
        m.rss,
        m.sigma2.sqrt(),
        m.df,
        m.log_likelihood,
        fit.iterations
    ));
    push_line(
        &mut out,
        format!("  {:<6} {:>14} {:>14} {:>10}", "param", "estimate", "std.error", "t value"),
    );
    for (j, name) in fit.kind.param_names().iter().enumerate() {
        let est = fit.theta.get(j).copied().unwrap_or(f64::NAN);
        let se = fit.std_errors.get(j).copied().unwrap_or(f64::NAN);
        push_line(
            &mut out,
            format!("  {:<6} {:>14} {:>14} {:>10}", name, fmt_num(est), fmt_num(se), fmt_t(est, se)),
        );
    }
    out.push('\n');

    out
}

/// Format the rows of a forecast table with `x > from_x` (the horizon when
/// `from_x` is the last observed day).
pub fn format_forecast_table(table: &ForecastTable, from_x: u32) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} forecast ({:.0}% prediction interval):\n",
        table.model.display_name(),
        table.confidence * 100.0
    ));
    if let Some(warning) = &table.interval_warning {
        out.push_str(&format!("  WARNING: {warning}\n"));
    }
    push_line(
        &mut out,
        format!(
            "  {:>5} {:<10} {:>14} {:>14} {:>14}",
            "x", "date", "fit", "lower", "upper"
        ),
    );
    push_line(
        &mut out,
        format!("  {:->5} {:-<10} {:->14} {:->14} {:->14}", "", "", "", "", ""),
    );
    for r in table.rows.iter().filter(|r| r.x > from_x) {
        let flag = if r.interval_valid { "" } else { " !" };
        push_line(
            &mut out,
            format!(
                "  {:>5} {:<10} {:>14.1} {:>14.1} {:>14.1}{flag}",
                r.x,
                r.date.format("%Y-%m-%d"),
                r.fit,
                r.lower,
                r.upper
            ),
        );
    }
    out.push('\n');

    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_num(v: f64) -> String {
    if !v.is_finite() {
        return "NA".to_string();
    }
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e7).contains(&a) {
        format!("{v:.4e}")
    } else {
        format!("{v:.6}")
    }
}

fn fmt_t(est: f64, se: f64) -> String {
    if se > 0.0 && se.is_finite() && est.is_finite() {
        format!("{:.3}", est / se)
    } else {
        "NA".to_string()
    }
}
