//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments (after loading `.env`)
//! - runs loading, fitting, ranking and forecasting
//! - prints reports/plots
//! - writes optional exports

use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use crate::cli::{Command, FitArgs, PlotArgs};
use crate::domain::{DataSource, FitConfig, InputSpec, SyntheticSpec};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `growth` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine; flags and the real environment still apply.
    dotenvy::dotenv().ok();

    // We want `growth` and `growth --input x.csv` to behave like `growth fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(args, OutputMode::Full),
        Command::Rank(args) => handle_fit(args, OutputMode::RankOnly),
        Command::Plot(args) => handle_plot(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    RankOnly,
}

fn handle_fit(args: FitArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    if mode == OutputMode::Full {
        print!(
            "{}",
            crate::report::format_run_summary(&run.source, &run.ingest.stats, &config)
        );
    }

    print!("{}", crate::report::format_comparison(&run.comparison));

    if mode == OutputMode::Full {
        for fit in &run.comparison.fits {
            print!("{}", crate::report::format_fit_details(fit));
        }
        for table in &run.forecasts {
            print!(
                "{}",
                crate::report::format_forecast_table(table, run.ingest.stats.x_max)
            );
        }

        if config.plot {
            let kind = config
                .plot_model
                .or_else(|| run.comparison.best().map(|f| f.kind));
            match kind.and_then(|k| run.forecast(k)) {
                Some(table) => {
                    let plot = crate::plot::render_ascii_plot(
                        &run.ingest.observations,
                        table,
                        config.plot_width,
                        config.plot_height,
                    );
                    println!("{plot}");
                }
                None => println!("(no forecast available to plot)\n"),
            }
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_forecast {
        crate::io::export::write_forecast_csv(path, &run.forecasts)?;
        info!(path = %path.display(), "wrote forecast CSV");
    }
    if let Some(path) = &config.export_report {
        crate::io::report_file::write_report_json(path, &run.to_report_file(&config))?;
        info!(path = %path.display(), "wrote report JSON");
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let report = crate::io::report_file::read_report_json(&args.report)?;
    let plot = crate::plot::render_from_report(&report, args.model, args.width, args.height)?;

    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    let source = match args.synthetic {
        Some(kind) => DataSource::Synthetic(SyntheticSpec {
            kind,
            theta: args.theta.clone(),
            days: args.days,
            noise_sd: args.noise,
            seed: args.seed,
            start_date: args
                .start
                .or_else(|| NaiveDate::from_ymd_opt(2020, 1, 22))
                .unwrap_or_default(),
        }),
        None => DataSource::Location(args.input.clone()),
    };

    FitConfig {
        source,
        input: InputSpec {
            date_column: args.date_column.clone(),
            count_column: args.count_column.clone(),
            date_format: args.date_format.clone(),
            start: args.start,
            end: args.end,
        },
        model_spec: args.model,
        max_iterations: args.max_iter,
        tolerance: args.tol,
        horizon: args.horizon,
        confidence: args.confidence,
        plot: args.plot && !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        plot_model: args.plot_model,
        export_forecast: args.export.clone(),
        export_report: args.export_report.clone(),
    }
}

/// Rewrite argv so `growth` defaults to `growth fit`.
///
/// Rules:
/// - `growth`                          -> `growth fit`
/// - `growth --input x.csv ...`        -> `growth fit --input x.csv ...`
/// - `growth --help/--version/-h`      -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "rank" | "plot");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
