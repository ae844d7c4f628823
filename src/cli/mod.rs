//! Command-line parsing for the campaign insights tool.
//!
//! Argument parsing and command dispatch stay separate from the pipeline code;
//! `app` turns these structs into a `RunConfig` and an `Orchestrator`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "insight", version, about = "Weekly ad-campaign performance reports")]
pub struct Cli {
    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline and write the client documents.
    Run(RunArgs),
    /// Ingest, merge and aggregate only; print the campaign table.
    ///
    /// Never calls the AI service and never renders documents.
    Inspect(InspectArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// YAML run configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Override `report.output_dir`.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    /// YAML run configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Write the merged metrics dataset to this CSV file.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_override() {
        let cli = Cli::parse_from(["insight", "run", "--config", "c.yaml", "--output-dir", "out", "--log-json"]);
        assert!(cli.log_json);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("c.yaml"));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn parses_inspect_export() {
        let cli = Cli::parse_from(["insight", "inspect", "-c", "c.yaml", "--export", "rows.csv"]);
        assert!(!cli.log_json);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.export, Some(PathBuf::from("rows.csv")));
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["insight", "run"]).is_err());
    }
}
