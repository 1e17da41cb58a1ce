pub mod field_key;
pub mod redb_alert_store;
pub mod redb_rule_stat_store;

/// File name of the alert database under the data directory.
pub const ALERTS_DB_FILE: &str = "alerts.redb";
/// File name of the rule counter database under the data directory.
pub const RULE_STATS_DB_FILE: &str = "rule_stats.redb";
