//! Sample analysis configuration.

use domain::analysis::entity::{ANALYZER_NAMES, AnalyzerSettings};
use serde::{Deserialize, Serialize};

use super::common::{ConfigError, require_http_url, require_positive};
use crate::constants::{DEFAULT_ANALYSIS_WAIT_SECS, DEFAULT_CUCKOO_ENDPOINT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Analyzer name, looked up in the static registry.
    #[serde(default = "default_module")]
    pub module: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Status polling interval for `analyze --wait`.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Give up waiting after this long.
    #[serde(default = "default_wait_secs")]
    pub wait_timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            module: default_module(),
            endpoint: default_endpoint(),
            api_token: None,
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            wait_timeout_secs: default_wait_secs(),
        }
    }
}

fn default_module() -> String {
    "cuckoo".to_string()
}
fn default_endpoint() -> String {
    DEFAULT_CUCKOO_ENDPOINT.to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_poll_interval_secs() -> u64 {
    30
}
fn default_wait_secs() -> u64 {
    DEFAULT_ANALYSIS_WAIT_SECS
}

impl AnalysisConfig {
    pub fn settings(&self) -> AnalyzerSettings {
        AnalyzerSettings {
            module: self.module.clone(),
            endpoint: self.endpoint.clone(),
            api_token: self.api_token.clone(),
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if !ANALYZER_NAMES.contains(&self.module.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "analysis.module".to_string(),
                value: self.module.clone(),
                expected: ANALYZER_NAMES.join("|"),
            });
        }
        require_http_url("analysis.endpoint", &self.endpoint)?;
        require_positive("analysis.timeout_secs", self.timeout_secs)?;
        require_positive("analysis.poll_interval_secs", self.poll_interval_secs)?;
        require_positive("analysis.wait_timeout_secs", self.wait_timeout_secs)
    }
}
