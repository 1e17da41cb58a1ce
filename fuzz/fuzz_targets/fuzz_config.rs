#![no_main]

use libfuzzer_sys::fuzz_target;

use infrastructure::config::AgentConfig;

// Arbitrary YAML through AgentConfig parsing and validation.
// Accepted configs must also sanitize without panicking.
fuzz_target!(|data: &[u8]| {
    let Ok(yaml) = std::str::from_utf8(data) else {
        return;
    };
    if yaml.len() > 64 * 1024 {
        return;
    }
    if let Ok(config) = AgentConfig::from_yaml(yaml) {
        let masked = config.sanitized();
        assert_eq!(masked.agent.data_dir, config.agent.data_dir);
    }
});
