//! Notification feed configuration.

use serde::{Deserialize, Serialize};

use super::common::{
    ConfigError, default_http_timeout, require_http_url, require_non_empty, require_positive,
};
use crate::constants::{DEFAULT_FEED_URL, DEFAULT_HTTP_TIMEOUT_SECS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedConfig {
    #[serde(default = "default_feed_url")]
    pub url: String,

    /// Intelligence API key. `FEEDSENTINEL_FEED_KEY` overrides it.
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            api_key: String::new(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_http_url("feed.url", &self.url)?;
        require_non_empty("feed.api_key", &self.api_key)?;
        require_positive("feed.timeout_secs", self.timeout_secs)
    }
}
