pub mod alert_store;
pub mod analysis_module;
pub mod feed_source;
pub mod report_source;
pub mod retirement_port;
pub mod rule_stat_store;
