use std::path::Path;
use std::sync::Mutex;

use domain::alert::entity::{Alert, FieldMap};
use domain::alert::error::AlertError;
use domain::alert::query::AlertQuery;
use ports::secondary::alert_store::AlertStore;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::warn;

use super::field_key::{escape_fields, unescape_fields};

/// redb table: key = alert id, value = JSON-serialized `Alert` with
/// escaped field names.
const ALERT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("alerts");

/// Secondary index: key = (`rule_name`, `alert_id`).
const RULE_INDEX: TableDefinition<(&str, &str), ()> = TableDefinition::new("alerts_by_rule");

/// Persistent alert store backed by redb.
///
/// The database file is exclusively locked while open, so a second
/// process pointed at the same data directory fails at `open`.
pub struct RedbAlertStore {
    db: Database,
    /// Serialize writes so check-and-insert and read-merge-write are atomic.
    write_lock: Mutex<()>,
}

impl RedbAlertStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, AlertError> {
        let db = Database::create(path)
            .map_err(|e| AlertError::StoreFailed(format!("redb open failed: {e}")))?;

        // Ensure both tables exist.
        let txn = db
            .begin_write()
            .map_err(|e| AlertError::StoreFailed(format!("redb txn begin: {e}")))?;
        {
            let _alerts = txn
                .open_table(ALERT_TABLE)
                .map_err(|e| AlertError::StoreFailed(format!("redb table create: {e}")))?;
            let _index = txn
                .open_table(RULE_INDEX)
                .map_err(|e| AlertError::StoreFailed(format!("redb index create: {e}")))?;
        }
        txn.commit()
            .map_err(|e| AlertError::StoreFailed(format!("redb commit: {e}")))?;

        Ok(Self {
            db,
            write_lock: Mutex::new(()),
        })
    }

    fn lock_writes(&self) -> Result<std::sync::MutexGuard<'_, ()>, AlertError> {
        self.write_lock
            .lock()
            .map_err(|e| AlertError::StoreFailed(format!("lock poisoned: {e}")))
    }

    /// Ids of alerts indexed under `rule_name`.
    fn ids_for_rule(&self, rule_name: &str) -> Result<Vec<String>, AlertError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AlertError::QueryFailed(format!("redb read txn: {e}")))?;
        let index = txn
            .open_table(RULE_INDEX)
            .map_err(|e| AlertError::QueryFailed(format!("redb read index: {e}")))?;

        let mut ids = Vec::new();
        for entry in index
            .range((rule_name, "")..)
            .map_err(|e| AlertError::QueryFailed(format!("redb index range: {e}")))?
        {
            let (key, _) =
                entry.map_err(|e| AlertError::QueryFailed(format!("redb index read: {e}")))?;
            let (rule, id) = key.value();
            if rule != rule_name {
                break;
            }
            ids.push(id.to_string());
        }
        Ok(ids)
    }
}

fn encode(alert: &Alert) -> Result<Vec<u8>, AlertError> {
    let mut stored = alert.clone();
    stored.raw_fields = escape_fields(&alert.raw_fields);
    stored.enrichment_fields = alert.enrichment_fields.as_ref().map(escape_fields);
    serde_json::to_vec(&stored).map_err(|e| AlertError::StoreFailed(format!("serialize: {e}")))
}

fn decode(bytes: &[u8]) -> Result<Alert, AlertError> {
    let mut alert: Alert = serde_json::from_slice(bytes)
        .map_err(|e| AlertError::QueryFailed(format!("deserialize: {e}")))?;
    alert.raw_fields = unescape_fields(&alert.raw_fields);
    alert.enrichment_fields = alert.enrichment_fields.as_ref().map(unescape_fields);
    Ok(alert)
}

impl AlertStore for RedbAlertStore {
    fn exists(&self, id: &str) -> Result<bool, AlertError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AlertError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(ALERT_TABLE)
            .map_err(|e| AlertError::QueryFailed(format!("redb read table: {e}")))?;
        let found = table
            .get(id)
            .map_err(|e| AlertError::QueryFailed(format!("redb get: {e}")))?
            .is_some();
        Ok(found)
    }

    fn insert(&self, alert: &Alert) -> Result<(), AlertError> {
        let _lock = self.lock_writes()?;
        let value = encode(alert)?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| AlertError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(ALERT_TABLE)
                .map_err(|e| AlertError::StoreFailed(format!("redb write table: {e}")))?;
            let present = table
                .get(alert.id.as_str())
                .map_err(|e| AlertError::StoreFailed(format!("redb get: {e}")))?
                .is_some();
            if present {
                return Err(AlertError::DuplicateKey(alert.id.clone()));
            }
            table
                .insert(alert.id.as_str(), value.as_slice())
                .map_err(|e| AlertError::StoreFailed(format!("redb insert: {e}")))?;

            let mut index = txn
                .open_table(RULE_INDEX)
                .map_err(|e| AlertError::StoreFailed(format!("redb write index: {e}")))?;
            index
                .insert((alert.rule_name.as_str(), alert.id.as_str()), ())
                .map_err(|e| AlertError::StoreFailed(format!("redb index insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| AlertError::StoreFailed(format!("redb write commit: {e}")))?;

        Ok(())
    }

    fn merge_fields(&self, id: &str, fields: &FieldMap) -> Result<(), AlertError> {
        let _lock = self.lock_writes()?;

        let txn = self
            .db
            .begin_write()
            .map_err(|e| AlertError::StoreFailed(format!("redb write txn: {e}")))?;
        {
            let mut table = txn
                .open_table(ALERT_TABLE)
                .map_err(|e| AlertError::StoreFailed(format!("redb write table: {e}")))?;

            let mut alert = match table
                .get(id)
                .map_err(|e| AlertError::StoreFailed(format!("redb get: {e}")))?
            {
                Some(guard) => decode(guard.value())?,
                None => return Err(AlertError::NotFound(id.to_string())),
            };

            alert.merge_enrichment(fields.clone());
            let value = encode(&alert)?;
            table
                .insert(id, value.as_slice())
                .map_err(|e| AlertError::StoreFailed(format!("redb insert: {e}")))?;
        }
        txn.commit()
            .map_err(|e| AlertError::StoreFailed(format!("redb write commit: {e}")))?;

        Ok(())
    }

    fn find_by_rule(&self, rule_name: &str) -> Result<bool, AlertError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AlertError::QueryFailed(format!("redb read txn: {e}")))?;
        let index = txn
            .open_table(RULE_INDEX)
            .map_err(|e| AlertError::QueryFailed(format!("redb read index: {e}")))?;

        let first = index
            .range((rule_name, "")..)
            .map_err(|e| AlertError::QueryFailed(format!("redb index range: {e}")))?
            .next();

        match first {
            Some(entry) => {
                let (key, _) =
                    entry.map_err(|e| AlertError::QueryFailed(format!("redb index read: {e}")))?;
                Ok(key.value().0 == rule_name)
            }
            None => Ok(false),
        }
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>, AlertError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AlertError::QueryFailed(format!("redb read txn: {e}")))?;
        let table = txn
            .open_table(ALERT_TABLE)
            .map_err(|e| AlertError::QueryFailed(format!("redb read table: {e}")))?;

        let result = table
            .get(id)
            .map_err(|e| AlertError::QueryFailed(format!("redb get: {e}")))?;

        match result {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, AlertError> {
        let mut alerts: Vec<Alert> = if let Some(ref rule) = query.rule_name {
            let ids = self.ids_for_rule(rule)?;
            let mut found = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(alert) = self.get_alert(&id)? {
                    found.push(alert);
                }
            }
            found
        } else {
            let txn = self
                .db
                .begin_read()
                .map_err(|e| AlertError::QueryFailed(format!("redb read txn: {e}")))?;
            let table = txn
                .open_table(ALERT_TABLE)
                .map_err(|e| AlertError::QueryFailed(format!("redb read table: {e}")))?;
            let mut found = Vec::new();
            for entry in table
                .iter()
                .map_err(|e| AlertError::QueryFailed(format!("redb iter: {e}")))?
            {
                let (key, value) =
                    entry.map_err(|e| AlertError::QueryFailed(format!("redb iter entry: {e}")))?;
                match decode(value.value()) {
                    Ok(alert) => found.push(alert),
                    Err(e) => {
                        warn!(alert_id = key.value(), error = %e, "skipping undecodable alert record");
                    }
                }
            }
            found
        };

        alerts.retain(|a| query.matches(a));

        // Newest first; id breaks ties so paging is stable.
        alerts.sort_by(|a, b| {
            b.first_seen_ns
                .cmp(&a.first_seen_ns)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = alerts.len();
        let start = query.offset.min(total);
        let end = start.saturating_add(query.limit).min(total);

        Ok(alerts.drain(start..end).collect())
    }

    fn alert_count(&self) -> Result<usize, AlertError> {
        let txn = self
            .db
            .begin_read()
            .map_err(|e| AlertError::QueryFailed(format!("redb count txn: {e}")))?;
        let table = txn
            .open_table(ALERT_TABLE)
            .map_err(|e| AlertError::QueryFailed(format!("redb count table: {e}")))?;
        let count = table
            .len()
            .map_err(|e| AlertError::QueryFailed(format!("redb count: {e}")))?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(count as usize)
    }
}
