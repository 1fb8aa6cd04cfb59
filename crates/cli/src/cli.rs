//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tentacles - rate-limited batch dispatcher for marketing APIs
#[derive(Parser, Debug)]
#[command(
    name = "tentacles",
    author,
    version,
    about = "Rate-limited batch dispatcher for marketing and advertising APIs",
    long_about = "Reads newline-delimited records, splits them into request-sized batches \n\
                  and uploads them to the configured api under a combined QPS, \n\
                  concurrency and payload-size budget with per-batch retry."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TENTACLES_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "TENTACLES_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch input files to an api
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display resolved per-api settings
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "tentacles.toml",
        env = "TENTACLES_CONFIG"
    )]
    pub config: PathBuf,

    /// Api code to dispatch to (e.g. AC)
    #[arg(short, long, env = "TENTACLES_API")]
    pub api: String,

    /// Newline-delimited input files, dispatched in order
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<PathBuf>,

    /// How input lines are interpreted (auto = by file extension)
    #[arg(long, value_enum, default_value = "auto", env = "TENTACLES_INPUT_FORMAT")]
    pub format: InputFormat,

    /// Override qps from configuration
    #[arg(long, env = "TENTACLES_QPS")]
    pub qps: Option<f64>,

    /// Override number_of_threads from configuration
    #[arg(long, env = "TENTACLES_THREADS")]
    pub threads: Option<usize>,

    /// Override records_per_request from configuration
    #[arg(long, env = "TENTACLES_RECORDS_PER_REQUEST")]
    pub records_per_request: Option<usize>,

    /// Read and batch the input, but do not upload
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TENTACLES_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "tentacles.toml", env = "TENTACLES_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tentacles.toml", env = "TENTACLES_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show only this api
    #[arg(short, long)]
    pub api: Option<String>,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Input line format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputFormat {
    /// Infer from the file extension (.json/.jsonl/.ndjson = json-lines)
    #[default]
    Auto,
    /// Every non-blank line is one opaque record
    Lines,
    /// Every non-blank line must be a JSON document
    JsonLines,
}

impl InputFormat {
    /// Explicit format, `None` when it must be inferred per file
    pub fn record_format(self) -> Option<ingestion::RecordFormat> {
        match self {
            Self::Auto => None,
            Self::Lines => Some(ingestion::RecordFormat::Lines),
            Self::JsonLines => Some(ingestion::RecordFormat::JsonLines),
        }
    }
}
