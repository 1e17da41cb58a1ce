//! Enrichment report configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::common::{
    ConfigError, default_http_timeout, require_http_url, require_non_empty, require_positive,
};
use crate::constants::{
    DEFAULT_ENRICH_BACKOFF_SECS, DEFAULT_ENRICH_MAX_BACKOFF_SECS, DEFAULT_ENRICH_MAX_RETRIES,
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_REPORT_URL,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_report_url")]
    pub url: String,

    /// Report API key, deliberately separate from the feed key.
    /// `FEEDSENTINEL_ENRICHMENT_KEY` overrides it.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Retries after a rate-limited attempt, within one alert.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Wait before retrying when the service gives no `Retry-After`.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Cap on any wait between attempts, `Retry-After` included.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_report_url(),
            api_key: String::new(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            max_retries: DEFAULT_ENRICH_MAX_RETRIES,
            backoff_secs: DEFAULT_ENRICH_BACKOFF_SECS,
            max_backoff_secs: DEFAULT_ENRICH_MAX_BACKOFF_SECS,
        }
    }
}

fn default_report_url() -> String {
    DEFAULT_REPORT_URL.to_string()
}
fn default_max_retries() -> usize {
    DEFAULT_ENRICH_MAX_RETRIES
}
fn default_backoff_secs() -> u64 {
    DEFAULT_ENRICH_BACKOFF_SECS
}
fn default_max_backoff_secs() -> u64 {
    DEFAULT_ENRICH_MAX_BACKOFF_SECS
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        require_http_url("enrichment.url", &self.url)?;
        require_non_empty("enrichment.api_key", &self.api_key)?;
        require_positive("enrichment.timeout_secs", self.timeout_secs)?;
        if self.max_retries > 10 {
            return Err(ConfigError::Validation {
                field: "enrichment.max_retries".to_string(),
                message: format!("{} exceeds maximum 10", self.max_retries),
            });
        }
        if self.max_backoff_secs < self.backoff_secs {
            return Err(ConfigError::Validation {
                field: "enrichment.max_backoff_secs".to_string(),
                message: format!(
                    "{} is below backoff_secs ({})",
                    self.max_backoff_secs, self.backoff_secs
                ),
            });
        }
        Ok(())
    }
}
