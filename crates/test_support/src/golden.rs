//! Golden fixture files.
//!
//! A fixture file is TOML with a `format` header and a list of `[[case]]`
//! tables. Each case carries a name, the expected text, a JSON-encoded
//! description of the input and an optional `status`. Rejected cases name
//! the error class in `error` instead of giving an input.

use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const GOLDEN_FORMAT_V1: &str = "golden-v1";

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Active,
    /// `expected` must fail to parse with the class named in `error`.
    Reject,
    Skip,
}

#[derive(Debug, Deserialize)]
pub struct GoldenCase {
    pub name: String,
    #[serde(default)]
    pub status: CaseStatus,
    pub expected: String,
    /// JSON document describing the input value.
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GoldenCase {
    pub fn input_json(&self) -> serde_json::Value {
        let raw = self.input.as_deref().unwrap_or("null");
        serde_json::from_str(raw)
            .unwrap_or_else(|err| panic!("case '{}' has invalid JSON input: {err}", self.name))
    }
}

#[derive(Debug, Deserialize)]
struct GoldenFile {
    format: String,
    #[serde(default, rename = "case")]
    cases: Vec<GoldenCase>,
}

pub fn load_golden(path: &Path) -> Vec<GoldenCase> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|err| panic!("failed to read golden file {path:?}: {err}"));
    parse_golden(&content, path)
}

pub fn parse_golden(content: &str, path: &Path) -> Vec<GoldenCase> {
    let file: GoldenFile = toml::from_str(content)
        .unwrap_or_else(|err| panic!("failed to parse golden file {path:?}: {err}"));
    assert_eq!(
        file.format, GOLDEN_FORMAT_V1,
        "unsupported format in {path:?}"
    );
    assert!(!file.cases.is_empty(), "golden file {path:?} has no cases");
    let mut seen = std::collections::BTreeSet::new();
    for case in &file.cases {
        assert!(
            seen.insert(case.name.as_str()),
            "duplicate case '{}' in {path:?}",
            case.name
        );
    }
    file.cases
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cases_with_defaults() {
        let content = r#"
format = "golden-v1"

[[case]]
name = "int"
expected = "i<1>"
input = '{"int": 1}'

[[case]]
name = "bad"
status = "reject"
expected = "i<x>"
error = "malformed"
"#;
        let cases = parse_golden(content, Path::new("inline.toml"));
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].status, CaseStatus::Active);
        assert_eq!(cases[0].input_json()["int"], 1);
        assert_eq!(cases[1].status, CaseStatus::Reject);
        assert!(cases[1].input_json().is_null());
        assert_eq!(cases[1].error.as_deref(), Some("malformed"));
    }

    #[test]
    #[should_panic(expected = "duplicate case")]
    fn duplicate_names_are_rejected() {
        let content = r#"
format = "golden-v1"

[[case]]
name = "a"
expected = ""

[[case]]
name = "a"
expected = ""
"#;
        parse_golden(content, Path::new("inline.toml"));
    }
}
