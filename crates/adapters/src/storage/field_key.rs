//! Reversible encoding of externally supplied field names.
//!
//! Feed and report payloads use arbitrary keys. Dots and a leading `$` are
//! structural in document stores, so keys are percent-encoded on write and
//! decoded on read. `%` itself is encoded first so the mapping stays
//! bijective.

use std::borrow::Cow;

use domain::alert::entity::FieldMap;
use serde_json::Value;

pub fn escape_key(key: &str) -> Cow<'_, str> {
    if !key.contains(['%', '.']) && !key.starts_with('$') {
        return Cow::Borrowed(key);
    }

    let mut out = String::with_capacity(key.len() + 8);
    for (idx, ch) in key.char_indices() {
        match ch {
            '%' => out.push_str("%25"),
            '.' => out.push_str("%2E"),
            '$' if idx == 0 => out.push_str("%24"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

pub fn unescape_key(key: &str) -> Cow<'_, str> {
    if !key.contains('%') {
        return Cow::Borrowed(key);
    }

    let mut out = String::with_capacity(key.len());
    let mut rest = key;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let decoded = match tail.get(..3) {
            Some("%25") => Some('%'),
            Some("%2E" | "%2e") => Some('.'),
            Some("%24") => Some('$'),
            _ => None,
        };
        if let Some(ch) = decoded {
            out.push(ch);
            rest = &tail[3..];
        } else {
            // Not one of ours; keep the byte as-is.
            out.push('%');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Escape every key in `fields`, recursing into nested objects and arrays.
pub fn escape_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(k, v)| (escape_key(k).into_owned(), map_value(v, escape_key)))
        .collect()
}

/// Inverse of [`escape_fields`].
pub fn unescape_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(k, v)| (unescape_key(k).into_owned(), map_value(v, unescape_key)))
        .collect()
}

fn map_value(value: &Value, f: fn(&str) -> Cow<'_, str>) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (f(k).into_owned(), map_value(v, f)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| map_value(v, f)).collect()),
        other => other.clone(),
    }
}
