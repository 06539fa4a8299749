#![no_main]

use formatter::{FormatterConfig, LosFormatter, MacKey, TypeRegistry};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let formatter = LosFormatter::default();

    // anything that parses must write back and parse again
    if let Ok(value) = formatter.from_token_string(text) {
        let written = formatter
            .to_token_string(&value)
            .expect("parsed value must serialize");
        assert!(formatter.from_token_string(&written).is_ok(), "{written:?}");
    }

    let _ = formatter.deserialize(text);

    let signed = LosFormatter::new(
        Arc::new(TypeRegistry::new()),
        FormatterConfig {
            mac_key: Some(MacKey::new("fuzz-key")),
            ..FormatterConfig::default()
        },
    );
    let _ = signed.deserialize(text);
});
