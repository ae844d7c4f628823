//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initialises logging
//! - loads the run configuration and resolves the API key
//! - wires the Gemini summarizer and SVG charts into an `Orchestrator`
//! - prints the run summary and the list of written files

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::ai::GeminiClient;
use crate::analytics::{compute_all, merge, summarize};
use crate::charts::SvgCharts;
use crate::cli::{Cli, Command, InspectArgs, RunArgs};
use crate::config::RunConfig;
use crate::domain::Stage;
use crate::error::AppError;
use crate::io::export::write_dataset_csv_file;
use crate::io::ingest::load_sources;
use crate::report::{format_campaign_table, format_run_summary};

pub mod pipeline;

pub use pipeline::{Orchestrator, RunOutput, RunState, StageRecord};

const DEFAULT_LOG_FILTER: &str = "campaign_insights=info";

/// Entry point for the `insight` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is fine; variables may come from the real environment.
    let _ = dotenvy::dotenv();

    let argv = rewrite_args(std::env::args().collect());
    let cli = Cli::parse_from(argv);
    init_logging(cli.log_json);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Inspect(args) => handle_inspect(args),
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // stdout carries the report; logs go to stderr.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let mut config = RunConfig::load(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.report.output_dir = dir;
    }

    let api_key = config.llm.resolve_api_key(|name| std::env::var(name).ok())?;
    let summarizer = GeminiClient::new(&config.llm, api_key)?;

    let mut orchestrator = Orchestrator::new(config, Box::new(summarizer), Box::new(SvgCharts::default()));
    let out = orchestrator.run()?;
    let config = orchestrator.config();

    println!("{}", format_run_summary(config, &out.ingest, &out.merged, &out.report));
    println!("{}", format_campaign_table(&out.report));
    for anomaly in &out.highlights.anomalies {
        println!("anomaly: {}", anomaly.describe());
    }
    println!("Wrote {} file(s) to {}:", out.documents.len(), config.report.output_dir.display());
    for path in &out.documents {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Ingest through Aggregate without calling the AI service or rendering.
fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let config = RunConfig::load(&args.config)?;

    let ingested = load_sources(&config.data_sources).map_err(|e| e.at_stage(Stage::Ingest))?;
    let tables = &ingested.tables;
    let merged = merge(&tables.traffic, &tables.clicks, tables.weather.as_ref(), &config.merge)
        .map_err(|e| e.at_stage(Stage::Merge))?;
    let rows = compute_all(&merged).map_err(|e| e.at_stage(Stage::ComputeMetrics))?;
    let report = summarize(&rows).map_err(|e| e.at_stage(Stage::Aggregate))?;

    println!("{}", format_run_summary(&config, &ingested.reports, &merged, &report));
    println!("{}", format_campaign_table(&report));

    if let Some(path) = &args.export {
        write_dataset_csv_file(path, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "exported dataset");
        println!("Exported {} row(s) to {}", rows.len(), path.display());
    }
    Ok(())
}

/// Rewrite argv so `insight --config FILE` runs the full pipeline.
///
/// Rules:
/// - `insight --config FILE ...`     -> `insight run --config FILE ...`
/// - `insight --help/--version/-h`   -> unchanged
/// - `insight run|inspect|help ...`  -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        return argv;
    };

    let is_top_level_help_or_version = matches!(arg1.as_str(), "-h" | "--help" | "-V" | "--version" | "help");
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "run" | "inspect");
    if is_subcommand {
        return argv;
    }

    // Leading flags (including the global --log-json) belong to `run`.
    if arg1.starts_with('-') {
        argv.insert(1, "run".to_string());
    }
    argv
}
