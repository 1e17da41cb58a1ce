use std::path::Path;
use std::sync::Mutex;

use domain::stats::entity::RuleStat;
use domain::stats::error::StatError;
use ports::secondary::rule_stat_store::RuleStatStore;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

/// redb table: key = rule name, value = occurrence count.
const RULE_STATS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("rule_stats");

/// Persistent per-rule counters backed by redb.
pub struct RedbRuleStatStore {
    db: Database,
    /// Serialize writes so read-add-write is atomic.
    write_lock: Mutex<()>,
}

impl RedbRuleStatStore {
    /// Open (or create) a redb database at `path` for rule counters.
    pub fn open(path: &Path) -> Result<Self, StatError> {
        let db = Database::create(path)
            .map_err(|e| StatError::StoreFailed(format!("redb open failed: {e}")))?;

        let txn = db
            .begin_write()
            .map_err(|e| StatError::StoreFailed(format!("redb txn begin: {e}")))?;
        {
            let _table = txn
                .open_table(RULE_STATS_TABLE)
                .map_err(|e| StatError::StoreFailed(format!("redb table create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| StatError::StoreFailed(format!("redb commit: {e}")))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }
}

impl RuleStatStore for RedbRuleStatStore {
    fn increment(&self, rule_name: &str) -> Result<u64, StatError> {
        let _lock = self
            .write_lock
            .lock()
            .map_err(|e| StatError::StoreFailed(format!("lock poisoned: {e}")))?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| StatError::StoreFailed(format!("redb write txn: {e}")))?;
        let count = {
            let mut table = txn
                .open_table(RULE_STATS_TABLE)
                .map_err(|e| StatError::StoreFailed(format!("redb write table: {e}")))?;
            let current = table
                .get(rule_name)
                .map_err(|e| StatError::StoreFailed(format!("redb get: {e}")))?
                .map_or(0, |guard| guard.value());
            let next = current.saturating_add(1);
            table
                .insert(rule_name, next)
                .map_err(|e| StatError::StoreFailed(format!("redb insert: {e}")))?;
            next
        };
        txn.commit()
            .map_err(|e| StatError::StoreFailed(format!("redb write commit: {e}")))?;

        Ok(count)
    }

    fn get(&self, rule_name: &str) -> Result<Option<RuleStat>, StatError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StatError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(RULE_STATS_TABLE)
            .map_err(|e| StatError::QueryFailed(format!("redb read table: {e}")))?;

        Ok(table
            .get(rule_name)
            .map_err(|e| StatError::QueryFailed(format!("redb get: {e}")))?
            .map(|guard| RuleStat::new(rule_name, guard.value())))
    }

    fn list(&self) -> Result<Vec<RuleStat>, StatError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| StatError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(RULE_STATS_TABLE)
            .map_err(|e| StatError::QueryFailed(format!("redb read table: {e}")))?;

        let mut stats = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| StatError::QueryFailed(format!("redb iter: {e}")))?
        {
            let (k, v) = entry.map_err(|e| StatError::QueryFailed(format!("redb read: {e}")))?;
            stats.push(RuleStat::new(k.value(), v.value()));
        }
        Ok(stats)
    }
}
