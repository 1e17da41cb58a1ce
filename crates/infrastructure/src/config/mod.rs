//! Agent configuration: structs, parsing, and validation.
//!
//! The config module is split across several sub-modules:
//! - `common`: shared helpers and `ConfigError`
//! - `feed`, `enrichment`, `retirement`, `analysis`: per-endpoint sections

mod analysis;
mod common;
mod enrichment;
mod feed;
mod retirement;

pub use analysis::AnalysisConfig;
pub use common::ConfigError;
pub use enrichment::EnrichmentConfig;
pub use feed::FeedConfig;
pub use retirement::RetirementConfig;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_RUN_TIMEOUT_SECS, ENRICHMENT_KEY_ENV,
    FEED_KEY_ENV, MIN_POLL_INTERVAL_SECS,
};
use common::{MASK, require_positive, warn_if_world_readable};

// ── Top-level config ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentInfo,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub retirement: RetirementConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AgentConfig {
    /// Load config from a YAML file, then apply credential overrides
    /// from the process environment.
    ///
    /// On Unix, logs a warning if the config file is world-readable,
    /// since it usually holds API keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        warn_if_world_readable(path, "config file");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, |name| std::env::var(name).ok())
    }

    /// Parse config from a YAML string. The environment is not consulted.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, |_| None)
    }

    fn parse(yaml: &str, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml_ng::from_str(yaml)?;
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(key) = env(FEED_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.feed.api_key = key;
        }
        if let Some(key) = env(ENRICHMENT_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.enrichment.api_key = key;
        }
    }

    /// Return a copy of the config with every credential masked.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        let mut sanitized = self.clone();
        if !sanitized.feed.api_key.is_empty() {
            sanitized.feed.api_key = MASK.to_string();
        }
        if !sanitized.enrichment.api_key.is_empty() {
            sanitized.enrichment.api_key = MASK.to_string();
        }
        if sanitized.retirement.api_key.is_some() {
            sanitized.retirement.api_key = Some(MASK.to_string());
        }
        if sanitized.analysis.api_token.is_some() {
            sanitized.analysis.api_token = Some(MASK.to_string());
        }
        sanitized
    }

    /// Validate the config after deserialization.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.agent.validate()?;
        self.feed.validate()?;
        self.enrichment.validate()?;
        self.retirement.validate()?;
        self.analysis.validate()
    }

    /// Key sent with retirement requests.
    pub fn retirement_key(&self) -> &str {
        self.retirement.effective_key(&self.feed.api_key)
    }
}

// ── Agent section ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentInfo {
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Log file path, rolled daily. Stdout only when unset.
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for AgentInfo {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: None,
            data_dir: default_data_dir(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}
fn default_log_format() -> LogFormat {
    LogFormat::Json
}
fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}
fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}
fn default_run_timeout() -> u64 {
    DEFAULT_RUN_TIMEOUT_SECS
}

impl AgentInfo {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "agent.data_dir".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS {
            return Err(ConfigError::Validation {
                field: "agent.poll_interval_secs".to_string(),
                message: format!(
                    "{} is below the minimum of {MIN_POLL_INTERVAL_SECS}",
                    self.poll_interval_secs
                ),
            });
        }
        require_positive("agent.run_timeout_secs", self.run_timeout_secs)
    }
}

// ── Log level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!(
                "invalid log level '{s}': expected error|warn|info|debug|trace"
            )),
        }
    }
}

// ── Log format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "text" | "pretty" => Ok(Self::Text),
            _ => Err(format!("invalid log format '{s}': expected json|text")),
        }
    }
}
