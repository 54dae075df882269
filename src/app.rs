//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the dataset (URL, file, or synthetic)
//! - runs OLS and the quantile sweep
//! - prints the comparison table and coefficient plot
//! - writes optional exports

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use log::info;

use crate::cli::{Command, DataArgs, FitArgs};
use crate::data::data_url_from_env;
use crate::domain::{DataSource, EstimatorConfig, ModelSpec, RunConfig};
use crate::error::AppError;
use crate::io::{ReportFile, load_dataset, write_rows_csv, write_rows_json};
use crate::report::{ComparisonTable, format_dataset_summary, format_run_summary, format_table};

pub mod pipeline;

use pipeline::RunOutput;

/// Entry point for the `qreg` binary.
pub fn run() -> Result<(), AppError> {
    // `qreg` and `qreg --synthetic ...` behave like `qreg fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Describe(args) => handle_describe(&args),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = run_config_from_args(args)?;
    let run = pipeline::run_pipeline(&config)?;

    println!("{}", publish_run(&config, &run)?);
    Ok(())
}

/// Write the exports, then render the report text.
///
/// Exports go first so a render failure cannot lose fitted rows.
pub fn publish_run(config: &RunConfig, run: &RunOutput) -> Result<String, AppError> {
    write_exports(config, run)?;
    render_report(config, run)
}

/// Write the optional CSV and JSON exports for a finished run.
pub fn write_exports(config: &RunConfig, run: &RunOutput) -> Result<(), AppError> {
    if let Some(path) = &config.export_csv {
        write_rows_csv(path, &run.all_rows())?;
        info!("Wrote {}", path.display());
    }
    if let Some(path) = &config.export_json {
        let report = ReportFile {
            tool: "qreg".to_string(),
            generated_at: Utc::now(),
            spec: config.spec.clone(),
            n_obs: run.n_obs,
            confidence_level: config.confidence_level,
            se_method: config.estimator.se_method,
            quantiles: config.quantiles.clone(),
            rows: run.all_rows(),
            failures: run.failures.clone(),
        };
        write_rows_json(path, &report)?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Run summary, comparison table and (unless disabled) coefficient panels.
pub fn render_report(config: &RunConfig, run: &RunOutput) -> Result<String, AppError> {
    let mut out = format_run_summary(config, run.n_obs, run.dropped, &run.fitted_models());
    out.push('\n');

    let table = ComparisonTable::build(&run.ols_rows, &run.quantile_rows, &run.fitted_quantiles)?;
    out.push_str(&format_table(&table, config.format, run.n_obs, &run.failures));

    if config.plot {
        let plot = crate::plot::render_coefficient_panels(
            &run.ols_rows,
            &run.quantile_rows,
            config.plot_width,
            config.plot_height,
        )?;
        out.push('\n');
        out.push_str(&plot);
    }
    Ok(out)
}

fn handle_describe(args: &DataArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&data_source_from_args(args), args.retries)?;
    println!(
        "{}",
        format_dataset_summary(&dataset.summary(), dataset.n_rows())
    );
    Ok(())
}

/// Resolve CLI arguments into a run configuration.
pub fn run_config_from_args(args: &FitArgs) -> Result<RunConfig, AppError> {
    let timeout = match args.timeout_secs {
        None => None,
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => {
            return Err(AppError::InvalidParameter(format!(
                "--timeout-secs must be positive, got {secs}."
            )));
        }
    };
    if args.max_iter == 0 {
        return Err(AppError::InvalidParameter(
            "--max-iter must be at least 1.".to_string(),
        ));
    }
    if !(args.tolerance.is_finite() && args.tolerance >= 0.0) {
        return Err(AppError::InvalidParameter(format!(
            "--tolerance must be a non-negative number, got {}.",
            args.tolerance
        )));
    }

    Ok(RunConfig {
        source: data_source_from_args(&args.data),
        fetch_attempts: args.data.retries,
        spec: ModelSpec {
            dependent: args.dependent.clone(),
            regressors: args.regressors.clone(),
            intercept: !args.no_intercept,
        },
        quantiles: args.quantiles.clone(),
        confidence_level: args.level,
        estimator: EstimatorConfig {
            se_method: args.se,
            max_iter: args.max_iter,
            tolerance: args.tolerance,
        },
        timeout,
        allow_partial: args.allow_partial,
        format: args.format,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_csv: args.export_csv.clone(),
        export_json: args.export_json.clone(),
    })
}

fn data_source_from_args(args: &DataArgs) -> DataSource {
    if args.synthetic {
        return DataSource::Synthetic {
            rows: args.synthetic_rows,
            seed: args.seed,
        };
    }
    let location = args.data.clone().unwrap_or_else(data_url_from_env);
    if location.starts_with("http://") || location.starts_with("https://") {
        DataSource::Url(location)
    } else {
        DataSource::Path(PathBuf::from(location))
    }
}

/// Rewrite argv so `qreg` defaults to `qreg fit`.
///
/// Rules:
/// - `qreg`                      -> `qreg fit`
/// - `qreg --synthetic ...`      -> `qreg fit --synthetic ...`
/// - `qreg --help/--version/-h`  -> unchanged (show top-level help/version)
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

    let is_subcommand = matches!(arg1.as_str(), "fit" | "describe");
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::pipeline::run_with_dataset;
    use crate::cli::Cli;
    use crate::data::generate_expenditure_sample;
    use crate::domain::{CoefficientEstimate, FittedModel, ModelKind, SeMethod};
    use crate::fit::EstimationSample;
    use crate::io::read_rows_json;
    use crate::models::QuantileEstimator;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rewrite_defaults_to_fit() {
        assert_eq!(rewrite_args(argv(&["qreg"])), argv(&["qreg", "fit"]));
        assert_eq!(
            rewrite_args(argv(&["qreg", "--synthetic"])),
            argv(&["qreg", "fit", "--synthetic"])
        );
        assert_eq!(
            rewrite_args(argv(&["qreg", "describe"])),
            argv(&["qreg", "describe"])
        );
        assert_eq!(rewrite_args(argv(&["qreg", "-h"])), argv(&["qreg", "-h"]));
    }

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut all = vec!["qreg", "fit"];
        all.extend_from_slice(extra);
        match Cli::parse_from(all).command {
            Command::Fit(args) => args,
            Command::Describe(_) => panic!("expected fit"),
        }
    }

    #[test]
    fn config_resolves_sources() {
        let config = run_config_from_args(&fit_args(&["--synthetic", "--seed", "7"])).unwrap();
        assert_eq!(config.source, DataSource::Synthetic { rows: 3064, seed: 7 });

        let config = run_config_from_args(&fit_args(&["--data", "https://example.org/d.dta"])).unwrap();
        assert_eq!(config.source, DataSource::Url("https://example.org/d.dta".to_string()));

        let config = run_config_from_args(&fit_args(&["--data", "local.csv", "--no-plot"])).unwrap();
        assert_eq!(config.source, DataSource::Path(PathBuf::from("local.csv")));
        assert!(!config.plot);
        assert!(config.spec.intercept);
        assert_eq!(config.timeout, None);
    }

    /// Reports the tau as every coefficient.
    struct Constant;

    impl QuantileEstimator for Constant {
        fn fit(&self, sample: &EstimationSample, tau: f64) -> Result<FittedModel, AppError> {
            Ok(FittedModel {
                kind: ModelKind::Quantile { tau },
                coefficients: sample
                    .terms
                    .iter()
                    .map(|term| CoefficientEstimate {
                        term: term.clone(),
                        estimate: tau,
                        std_error: 0.01,
                        statistic: tau / 0.01,
                        p_value: 0.001,
                    })
                    .collect(),
                df_residual: (sample.n_obs() - sample.n_terms()) as f64,
                n_obs: sample.n_obs(),
                se_method: Some(SeMethod::Nid),
                objective: 0.0,
                iterations: 1,
            })
        }
    }

    #[test]
    fn exports_survive_plot_failure() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("rows.csv");
        let json_path = dir.path().join("rows.json");
        let csv_arg = csv_path.to_string_lossy().to_string();
        let json_arg = json_path.to_string_lossy().to_string();
        // 0.5 and 0.505 land in the same column of a 60-wide panel.
        let config = run_config_from_args(&fit_args(&[
            "--synthetic",
            "-q",
            "0.5,0.505",
            "--export-csv",
            csv_arg.as_str(),
            "--export-json",
            json_arg.as_str(),
        ]))
        .unwrap();
        let dataset = generate_expenditure_sample(400, 42).unwrap();
        let run = run_with_dataset(&config, &dataset, Arc::new(Constant)).unwrap();

        let err = publish_run(&config, &run).unwrap_err();
        assert!(matches!(err, AppError::RenderFailure(_)), "{err:?}");

        assert!(csv_path.exists());
        let report = read_rows_json(&json_path).unwrap();
        assert_eq!(report.rows.len(), 6 + 2 * 6);
        assert_eq!(report.quantiles, vec![0.5, 0.505]);
    }

    #[test]
    fn report_renders_table_and_panels() {
        let config = run_config_from_args(&fit_args(&["--synthetic", "-q", "0.25,0.75"])).unwrap();
        let dataset = generate_expenditure_sample(400, 42).unwrap();
        let run = run_with_dataset(&config, &dataset, Arc::new(Constant)).unwrap();
        let text = publish_run(&config, &run).unwrap();
        assert!(text.contains("QR(0.25)"));
        assert_eq!(text.matches("OLS=").count(), 6);
    }

    #[test]
    fn config_rejects_bad_numbers() {
        for extra in [
            ["--timeout-secs", "0"],
            ["--max-iter", "0"],
            ["--tolerance=-1", "--synthetic"],
        ] {
            let err = run_config_from_args(&fit_args(&extra)).unwrap_err();
            assert!(matches!(err, AppError::InvalidParameter(_)), "{extra:?}");
        }
        let config = run_config_from_args(&fit_args(&["--timeout-secs", "1.5"])).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
    }
}
