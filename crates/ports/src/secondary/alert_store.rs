use domain::alert::entity::{Alert, FieldMap};
use domain::alert::error::AlertError;
use domain::alert::query::AlertQuery;

/// Durable alert records keyed by feed-assigned id.
///
/// Implementations may use redb or in-memory storage. Records are never
/// deleted locally.
pub trait AlertStore: Send + Sync {
    fn exists(&self, id: &str) -> Result<bool, AlertError>;

    /// Store a new alert.
    ///
    /// Fails with `AlertError::DuplicateKey` if `alert.id` is already
    /// present. This is a backstop; callers check `exists` first.
    fn insert(&self, alert: &Alert) -> Result<(), AlertError>;

    /// Merge enrichment fields into the stored alert, key by key.
    ///
    /// Idempotent. Fails with `AlertError::NotFound` for unknown ids.
    fn merge_fields(&self, id: &str, fields: &FieldMap) -> Result<(), AlertError>;

    /// Whether any stored alert was produced by `rule_name`. Kept for
    /// reporting; ingestion counts rules through `RuleStatStore`.
    fn find_by_rule(&self, rule_name: &str) -> Result<bool, AlertError>;

    fn get_alert(&self, id: &str) -> Result<Option<Alert>, AlertError>;

    /// Stored alerts matching `query`, newest first.
    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError>;

    fn alert_count(&self) -> Result<usize, AlertError>;
}
