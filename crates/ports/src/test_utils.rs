//! In-memory store doubles for application-layer tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use domain::alert::entity::{Alert, FieldMap};
use domain::alert::error::AlertError;
use domain::alert::query::AlertQuery;
use domain::stats::entity::RuleStat;
use domain::stats::error::StatError;

use crate::secondary::alert_store::AlertStore;
use crate::secondary::rule_stat_store::RuleStatStore;

/// `AlertStore` backed by a `BTreeMap`, with the same duplicate-key
/// backstop as the persistent store.
#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<BTreeMap<String, Alert>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Alert>>, AlertError> {
        self.alerts
            .lock()
            .map_err(|e| AlertError::StoreFailed(format!("lock poisoned: {e}")))
    }
}

impl AlertStore for MemoryAlertStore {
    fn exists(&self, id: &str) -> Result<bool, AlertError> {
        Ok(self.lock()?.contains_key(id))
    }

    fn insert(&self, alert: &Alert) -> Result<(), AlertError> {
        let mut alerts = self.lock()?;
        if alerts.contains_key(&alert.id) {
            return Err(AlertError::DuplicateKey(alert.id.clone()));
        }
        alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    fn merge_fields(&self, id: &str, fields: &FieldMap) -> Result<(), AlertError> {
        let mut alerts = self.lock()?;
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.to_string()))?;
        alert.merge_enrichment(fields.clone());
        Ok(())
    }

    fn find_by_rule(&self, rule_name: &str) -> Result<bool, AlertError> {
        Ok(self.lock()?.values().any(|a| a.rule_name == rule_name))
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>, AlertError> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError> {
        let mut alerts: Vec<Alert> = self
            .lock()?
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.first_seen_ns.cmp(&a.first_seen_ns));
        Ok(alerts
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }

    fn alert_count(&self) -> Result<usize, AlertError> {
        Ok(self.lock()?.len())
    }
}

/// `RuleStatStore` backed by a `BTreeMap`.
#[derive(Default)]
pub struct MemoryRuleStatStore {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl MemoryRuleStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count for `rule_name`, 0 when absent.
    pub fn count(&self, rule_name: &str) -> u64 {
        self.counts
            .lock()
            .map(|c| c.get(rule_name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, u64>>, StatError> {
        self.counts
            .lock()
            .map_err(|e| StatError::StoreFailed(format!("lock poisoned: {e}")))
    }
}

impl RuleStatStore for MemoryRuleStatStore {
    fn increment(&self, rule_name: &str) -> Result<u64, StatError> {
        let mut counts = self.lock()?;
        let count = counts.entry(rule_name.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    fn get(&self, rule_name: &str) -> Result<Option<RuleStat>, StatError> {
        Ok(self
            .lock()?
            .get(rule_name)
            .map(|c| RuleStat::new(rule_name, *c)))
    }

    fn list(&self) -> Result<Vec<RuleStat>, StatError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(name, c)| RuleStat::new(name.clone(), *c))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(id: &str, rule: &str) -> Alert {
        let mut fields = FieldMap::new();
        fields.insert("id".into(), id.into());
        fields.insert("sha1".into(), "h".into());
        fields.insert("ruleset_name".into(), rule.into());
        Alert::from_fields(fields).unwrap()
    }

    #[test]
    fn memory_store_rejects_duplicates() {
        let store = MemoryAlertStore::new();
        store.insert(&alert("1", "R1")).unwrap();
        let err = store.insert(&alert("1", "R1")).unwrap_err();
        assert!(matches!(err, AlertError::DuplicateKey(id) if id == "1"));
        assert_eq!(store.alert_count().unwrap(), 1);
    }

    #[test]
    fn memory_store_find_by_rule() {
        let store = MemoryAlertStore::new();
        store.insert(&alert("1", "R1")).unwrap();
        assert!(store.find_by_rule("R1").unwrap());
        assert!(!store.find_by_rule("R2").unwrap());
    }

    #[test]
    fn memory_stats_increment_creates_then_adds() {
        let stats = MemoryRuleStatStore::new();
        assert_eq!(stats.increment("R1").unwrap(), 1);
        assert_eq!(stats.increment("R1").unwrap(), 2);
        assert_eq!(stats.count("R1"), 2);
        assert_eq!(stats.count("R2"), 0);
        assert_eq!(stats.list().unwrap().len(), 1);
    }
}
