use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "feedsentinel",
    about = "Threat-intelligence notification feed ingester",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: String,

    /// Log level override (takes precedence over config file)
    #[arg(short, long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (default, production) or text (development)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table (default)
    Table,
    /// JSON
    Json,
}

/// Enrichment filter for `alerts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnrichedFilter {
    Yes,
    No,
}

impl EnrichedFilter {
    pub fn as_bool(self) -> bool {
        self == Self::Yes
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Display version and build information
    Version,

    /// Run a single ingestion pass and print its report (cron entry point)
    Once,

    /// Show per-rule alert counts, highest first
    Stats,

    /// List stored alerts, newest first
    Alerts {
        /// Only alerts raised by this rule
        #[arg(long)]
        rule: Option<String>,

        /// Filter on whether enrichment data is present
        #[arg(long)]
        enriched: Option<EnrichedFilter>,

        /// Maximum number of alerts to return
        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Number of alerts to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show one stored alert with raw and enrichment fields
    Alert {
        /// Alert ID
        id: String,
    },

    /// Submit a local sample for an alert to the configured analyzer
    Analyze {
        /// Alert the sample belongs to
        alert_id: String,

        /// Path to the sample file
        sample: PathBuf,

        /// Poll until the analysis finishes, then clean up the task
        #[arg(long)]
        wait: bool,
    },
}

/// Parse CLI arguments.
pub fn parse() -> Cli {
    Cli::parse()
}
