//! Remote retirement configuration.

use serde::{Deserialize, Serialize};

use super::common::{ConfigError, default_http_timeout, require_http_url, require_positive};
use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_RETIRE_URL};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetirementConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_retire_url")]
    pub url: String,

    /// Falls back to `feed.api_key` when absent.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for RetirementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_retire_url(),
            api_key: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

fn default_retire_url() -> String {
    DEFAULT_RETIRE_URL.to_string()
}

impl RetirementConfig {
    /// The key to send: this section's own, else the feed key.
    pub fn effective_key<'a>(&'a self, feed_key: &'a str) -> &'a str {
        match self.api_key {
            Some(ref key) if !key.trim().is_empty() => key,
            _ => feed_key,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        require_http_url("retirement.url", &self.url)?;
        require_positive("retirement.timeout_secs", self.timeout_secs)
    }
}
