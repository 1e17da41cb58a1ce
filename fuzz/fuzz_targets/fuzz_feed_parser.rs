#![no_main]

use libfuzzer_sys::fuzz_target;

use adapters::intel::notification_feed::parse_notifications;
use adapters::intel::report_source::parse_report;

// Feed batches and enrichment reports come straight off the network.
// Parsing must never panic, and an accepted batch must only carry
// alerts with a non-empty id.
fuzz_target!(|data: &[u8]| {
    if let Ok(alerts) = parse_notifications(data) {
        for alert in &alerts {
            assert!(!alert.id.is_empty());
        }
    }

    let _ = parse_report("da39a3ee5e6b4b0d3255bfef95601890afd80709", data);
});
