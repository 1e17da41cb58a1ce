use serde::{Deserialize, Serialize};

/// Outcome of a remote retirement request.
///
/// `requested` is the number of ids the remote side acknowledged receiving,
/// `confirmed` the number it actually cleared. Anything short of
/// `confirmed == requested` means some notifications may be redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetirementResult {
    pub requested: usize,
    pub confirmed: usize,
}

impl RetirementResult {
    pub fn new(requested: usize, confirmed: usize) -> Self {
        Self {
            requested,
            confirmed,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.confirmed == self.requested
    }

    /// Number of ids the remote side did not clear.
    pub fn unconfirmed(&self) -> usize {
        self.requested.saturating_sub(self.confirmed)
    }
}

/// Phase of an ingestion run, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetching,
    Processing,
    Storing,
    Skipping,
    Enriching,
    Retiring,
    Done,
}

impl RunPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Processing => "processing",
            Self::Storing => "storing",
            Self::Skipping => "skipping",
            Self::Enriching => "enriching",
            Self::Retiring => "retiring",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run counters reported at the end of an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Notifications returned by the feed.
    pub fetched: usize,
    /// Alerts stored for the first time.
    pub new_alerts: usize,
    /// Alerts already present in the store.
    pub redelivered: usize,
    pub enriched: usize,
    pub enrich_failed: usize,
    /// New alerts left unenriched because enrichment was paused or the hash was empty.
    pub enrich_skipped: usize,
    pub retired: usize,
    pub retire_partial: usize,
    pub retire_failed: usize,
    /// Inserts rejected by the store backstop.
    pub duplicate_keys: usize,
    pub stat_errors: usize,
}

impl IngestReport {
    /// True when no per-alert step reported a failure.
    pub fn is_clean(&self) -> bool {
        self.enrich_failed == 0
            && self.retire_partial == 0
            && self.retire_failed == 0
            && self.duplicate_keys == 0
            && self.stat_errors == 0
    }
}
