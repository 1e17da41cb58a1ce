use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Analyzer names accepted in configuration.
pub const ANALYZER_NAMES: &[&str] = &["cuckoo"];

/// A locally available sample handed to an analysis module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub path: PathBuf,
    /// Free-form tags forwarded to the analyzer (rule name, content hash).
    pub tags: Vec<String>,
}

/// Handle returned by an analyzer for a submitted sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTicket {
    pub module: String,
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings handed to an analyzer factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerSettings {
    /// Registry name of the analyzer (e.g. `cuckoo`).
    pub module: String,
    pub endpoint: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}
