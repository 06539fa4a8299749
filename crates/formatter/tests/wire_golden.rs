use formatter::{FormatError, LosFormatter};
use std::path::PathBuf;
use test_support::golden::{CaseStatus, load_golden};
use test_support::{diff_lines, escape_text};

mod common;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/wire_golden.toml")
}

fn error_class(err: &FormatError) -> &'static str {
    match err {
        FormatError::MalformedState { .. } => "malformed",
        FormatError::ValidationFailed => "validation",
        FormatError::NonSerializable { .. } => "non-serializable",
        FormatError::TypeLoad { .. } => "type-load",
        FormatError::InvalidTypeName { .. } => "invalid-type-name",
        FormatError::Conversion { .. } => "conversion",
    }
}

#[test]
fn wire_golden_write_matches_tokens() {
    let formatter = LosFormatter::default();
    let mut expected = Vec::new();
    let mut actual = Vec::new();
    for case in load_golden(&fixture_path()) {
        if case.status != CaseStatus::Active {
            continue;
        }
        let value = common::value_from_json(&case.input_json());
        let written = formatter
            .to_token_string(&value)
            .unwrap_or_else(|err| panic!("case '{}' failed to write: {err}", case.name));
        expected.push(format!("{}: {}", case.name, escape_text(&case.expected)));
        actual.push(format!("{}: {}", case.name, escape_text(&written)));
    }
    assert!(!expected.is_empty(), "no active cases");
    assert!(expected == actual, "{}", diff_lines(&expected, &actual));
}

#[test]
fn wire_golden_read_matches_values() {
    let formatter = LosFormatter::default();
    for case in load_golden(&fixture_path()) {
        match case.status {
            CaseStatus::Skip => {}
            CaseStatus::Active => {
                let value = common::value_from_json(&case.input_json());
                let read = formatter
                    .from_token_string(&case.expected)
                    .unwrap_or_else(|err| panic!("case '{}' failed to read: {err}", case.name));
                assert_eq!(read, value, "case '{}'", case.name);
            }
            CaseStatus::Reject => {
                let expected = case
                    .error
                    .as_deref()
                    .unwrap_or_else(|| panic!("case '{}' has no error class", case.name));
                match formatter.from_token_string(&case.expected) {
                    Ok(value) => panic!("case '{}' was accepted as {value:?}", case.name),
                    Err(err) => assert_eq!(error_class(&err), expected, "case '{}': {err}", case.name),
                }
            }
        }
    }
}
