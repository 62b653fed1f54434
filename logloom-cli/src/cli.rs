//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Logloom -- online log-template compression with anomaly detection.
///
/// Use `logloom <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logloom", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logloom.toml configuration file.
    #[arg(short, long, default_value = "logloom.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingest pipeline over a log file or stdin.
    Run(RunArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run the ingest pipeline.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Input log file (reads stdin when omitted).
    pub input: Option<PathBuf>,

    /// Source label attached to every record (default: derived from input).
    #[arg(long)]
    pub source: Option<String>,

    /// Number of parallel workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Input queue capacity.
    #[arg(long)]
    pub buffer: Option<usize>,

    /// Maximum depth of the template tree.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Template similarity threshold (0.0 - 1.0).
    #[arg(long)]
    pub sim_threshold: Option<f64>,

    /// Maximum children per tree node.
    #[arg(long)]
    pub max_children: Option<usize>,

    /// Maximum clusters per leaf node.
    #[arg(long)]
    pub max_clusters: Option<usize>,

    /// Error-spike z-score threshold.
    #[arg(long)]
    pub error_threshold: Option<f64>,

    /// Volume anomaly z-score threshold.
    #[arg(long)]
    pub volume_threshold: Option<f64>,

    /// Print every compressed record as it is emitted.
    #[arg(long)]
    pub records: bool,
}

// ---- config ----

/// Manage logloom configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + defaults).
    Show {
        /// Show only a specific section (general, drain, pool, detector, redactor).
        #[arg(long)]
        section: Option<String>,
    },
}
