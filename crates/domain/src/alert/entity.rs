use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::alert::error::AlertError;

/// Field name → value mapping, as delivered by the remote service.
pub type FieldMap = serde_json::Map<String, Value>;

/// Keys accepted for the detection rule name, in order of preference.
const RULE_KEYS: &[&str] = &["ruleset_name", "rule_name"];
/// Keys accepted for the content hash, in order of preference.
const HASH_KEYS: &[&str] = &["sha1", "content_hash", "sha256", "md5"];

/// One notification from the hunting feed.
///
/// `id` is the primary key: exactly one record exists per distinct id ever
/// observed. `raw_fields` keeps the notification verbatim; enrichment data
/// is merged into `enrichment_fields` later and never overwrites raw data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub content_hash: String,
    pub rule_name: String,
    /// Wall-clock time (ns since epoch) the alert was first stored.
    #[serde(default)]
    pub first_seen_ns: u64,
    pub raw_fields: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_fields: Option<FieldMap>,
}

impl Alert {
    /// Build an alert from a raw feed notification.
    ///
    /// The id may be a string or an integer; rule name and content hash
    /// must be strings. Missing required fields yield `AlertError::Malformed`.
    pub fn from_fields(fields: FieldMap) -> Result<Self, AlertError> {
        let id = match fields.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
        .ok_or_else(|| AlertError::Malformed("notification has no usable 'id'".to_string()))?;

        let rule_name = first_str(&fields, RULE_KEYS).ok_or_else(|| {
            AlertError::Malformed(format!("notification '{id}' has no 'ruleset_name'"))
        })?;

        let content_hash = first_str(&fields, HASH_KEYS).ok_or_else(|| {
            AlertError::Malformed(format!("notification '{id}' has no content hash"))
        })?;

        Ok(Self {
            id,
            content_hash,
            rule_name,
            first_seen_ns: 0,
            raw_fields: fields,
            enrichment_fields: None,
        })
    }

    /// Merge enrichment data key by key. Re-applying the same mapping
    /// yields the same record; keys absent from `fields` are kept.
    pub fn merge_enrichment(&mut self, fields: FieldMap) {
        let target = self.enrichment_fields.get_or_insert_with(FieldMap::new);
        for (k, v) in fields {
            target.insert(k, v);
        }
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment_fields.is_some()
    }
}

fn first_str(fields: &FieldMap, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str).map(str::to_string))
}
