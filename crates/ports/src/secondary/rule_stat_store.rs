use domain::stats::entity::RuleStat;
use domain::stats::error::StatError;

/// Durable per-rule occurrence counters.
pub trait RuleStatStore: Send + Sync {
    /// Atomically add one to the counter for `rule_name`, creating it at 1
    /// if absent. Returns the new count.
    fn increment(&self, rule_name: &str) -> Result<u64, StatError>;

    fn get(&self, rule_name: &str) -> Result<Option<RuleStat>, StatError>;

    /// All counters, in no particular order.
    fn list(&self) -> Result<Vec<RuleStat>, StatError>;
}
