//! Request values consulted for vary-by-param and vary-by-control keys.

use core_types::HttpMethod;
use std::collections::HashSet;

/// Ordered name/value pairs: the query string, followed by form fields on
/// a POST. Names compare case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestValues {
    pairs: Vec<(String, String)>,
}

impl RequestValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_query(query: &str) -> Self {
        let mut values = Self::new();
        values.extend_urlencoded(query);
        values
    }

    pub fn for_request(method: HttpMethod, query: &str, form: &str) -> Self {
        let mut values = Self::from_query(query);
        if method == HttpMethod::Post {
            values.extend_urlencoded(form);
        }
        values
    }

    fn extend_urlencoded(&mut self, encoded: &str) {
        let encoded = encoded.strip_prefix('?').unwrap_or(encoded);
        for (name, value) in url::form_urlencoded::parse(encoded.as_bytes()) {
            self.pairs.push((name.into_owned(), value.into_owned()));
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// All values for `name` joined with `,`, or `None` if absent.
    pub fn get(&self, name: &str) -> Option<String> {
        let mut found: Option<String> = None;
        for (key, value) in &self.pairs {
            if !key.eq_ignore_ascii_case(name) {
                continue;
            }
            match &mut found {
                Some(joined) => {
                    joined.push(',');
                    joined.push_str(value);
                }
                None => found = Some(value.clone()),
            }
        }
        found
    }

    /// Distinct names in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .map(|(key, _)| key.as_str())
            .filter(|key| seen.insert(key.to_ascii_lowercase()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_appends_form_after_query() {
        let values = RequestValues::for_request(HttpMethod::Post, "?page=2&sort=name", "q=tea+pot&page=3");
        assert_eq!(values.keys(), vec!["page", "sort", "q"]);
        assert_eq!(values.get("PAGE").as_deref(), Some("2,3"));
        assert_eq!(values.get("q").as_deref(), Some("tea pot"));
        assert_eq!(values.get("missing"), None);
    }

    #[test]
    fn get_ignores_form() {
        let values = RequestValues::for_request(HttpMethod::Get, "a=1", "b=2");
        assert_eq!(values.keys(), vec!["a"]);
    }

    #[test]
    fn empty_value_is_present() {
        let values = RequestValues::from_query("flag=&x=%3B");
        assert_eq!(values.get("flag").as_deref(), Some(""));
        assert_eq!(values.get("x").as_deref(), Some(";"));
    }
}
