use std::time::Duration;

// ── Paths ──────────────────────────────────────────────────────────

pub const DEFAULT_CONFIG_PATH: &str = "/etc/feedsentinel/config.yaml";
pub const DEFAULT_DATA_DIR: &str = "/var/lib/feedsentinel";

// ── Remote endpoints ───────────────────────────────────────────────

pub const DEFAULT_FEED_URL: &str =
    "https://www.virustotal.com/intelligence/hunting/notifications-feed/";
pub const DEFAULT_REPORT_URL: &str = "https://www.virustotal.com/vtapi/v2/file/report";
pub const DEFAULT_RETIRE_URL: &str =
    "https://www.virustotal.com/intelligence/hunting/delete-notifications/programmatic/";
pub const DEFAULT_CUCKOO_ENDPOINT: &str = "http://127.0.0.1:8090";

// ── Credentials from the environment ───────────────────────────────

pub const FEED_KEY_ENV: &str = "FEEDSENTINEL_FEED_KEY";
pub const ENRICHMENT_KEY_ENV: &str = "FEEDSENTINEL_ENRICHMENT_KEY";

// ── Scheduling ─────────────────────────────────────────────────────

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;
pub const MIN_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 1800;

// ── Timeouts ───────────────────────────────────────────────────────

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ANALYSIS_WAIT_SECS: u64 = 1800;
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ── Enrichment back-off ────────────────────────────────────────────

/// The public report API allows four requests per minute.
pub const DEFAULT_ENRICH_BACKOFF_SECS: u64 = 15;
pub const DEFAULT_ENRICH_MAX_RETRIES: usize = 1;
/// Longest `Retry-After` honoured in-run. Anything longer pauses
/// enrichment until the next run.
pub const DEFAULT_ENRICH_MAX_BACKOFF_SECS: u64 = 60;
