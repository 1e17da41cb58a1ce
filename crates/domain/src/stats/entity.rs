use serde::{Deserialize, Serialize};

/// Number of distinct alerts stored under one detection rule.
///
/// Incremented exactly once per newly stored alert, never on re-delivery,
/// so `count` always equals the number of stored alerts with `rule_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStat {
    pub rule_name: String,
    pub count: u64,
}

impl RuleStat {
    pub fn new(rule_name: impl Into<String>, count: u64) -> Self {
        Self {
            rule_name: rule_name.into(),
            count,
        }
    }
}

/// Order stats by count descending, ties broken by rule name.
pub fn sort_by_count_desc(stats: &mut [RuleStat]) {
    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.rule_name.cmp(&b.rule_name))
    });
}
