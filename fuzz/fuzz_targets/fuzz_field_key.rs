#![no_main]

use libfuzzer_sys::fuzz_target;

use adapters::storage::field_key::{escape_fields, escape_key, unescape_fields, unescape_key};
use domain::alert::entity::FieldMap;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Escaped keys never carry a '.' or a leading '$', and always decode back.
    let escaped = escape_key(text);
    assert!(!escaped.contains('.'));
    assert!(!escaped.starts_with('$'));
    assert_eq!(unescape_key(&escaped), text);

    // Whole documents survive the store codec unchanged.
    if let Ok(fields) = serde_json::from_str::<FieldMap>(text) {
        assert_eq!(unescape_fields(&escape_fields(&fields)), fields);
    }
});
