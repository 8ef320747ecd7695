//! Request header table and response header formatting.
//!
//! Request header names keep the casing of the first call that set them;
//! repeated sets for the same name accumulate values joined with `", "`.
//! Connection-control and framing headers are refused outright: not an
//! error, a warned no-op, so a caller can't smuggle framing past the
//! transport.

use std::collections::BTreeMap;

/// Headers a caller is never allowed to set directly.
const FORBIDDEN_REQUEST_HEADERS: &[&str] = &[
    "accept-charset",
    "accept-encoding",
    "access-control-request-headers",
    "access-control-request-method",
    "connection",
    "content-length",
    "content-transfer-encoding",
    "cookie",
    "cookie2",
    "date",
    "expect",
    "host",
    "keep-alive",
    "origin",
    "referer",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "via",
];

/// Request methods that are never allowed.
const FORBIDDEN_REQUEST_METHODS: &[&str] = &["TRACE", "TRACK", "CONNECT"];

pub(crate) fn is_allowed_header(name: &str) -> bool {
    !FORBIDDEN_REQUEST_HEADERS.contains(&name.to_ascii_lowercase().as_str())
}

pub(crate) fn is_allowed_method(method: &str) -> bool {
    !FORBIDDEN_REQUEST_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
}

#[derive(Debug, Clone)]
struct HeaderEntry {
    /// Canonical casing: whatever the first `set` used.
    name: String,
    value: String,
}

/// The request-side header table, keyed case-insensitively.
#[derive(Debug, Clone)]
pub struct HeaderTable {
    entries: BTreeMap<String, HeaderEntry>,
    user_agent: String,
}

impl HeaderTable {
    pub fn new(user_agent: &str) -> Self {
        let mut table = Self {
            entries: BTreeMap::new(),
            user_agent: user_agent.to_string(),
        };
        table.reset();
        table
    }

    /// Drop everything and reinstall the default header set.
    pub fn reset(&mut self) {
        self.entries.clear();
        let ua = self.user_agent.clone();
        self.set_internal("User-Agent", &ua);
        self.set_internal("Accept", "*/*");
    }

    /// Set a header, appending with `", "` if the name is already present.
    ///
    /// Returns `false` (after a warning) when the name is in the forbidden
    /// set; the table is left untouched.
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        if FORBIDDEN_REQUEST_HEADERS.contains(&lower.as_str()) {
            log::warn!("refused to set unsafe header \"{name}\"");
            return false;
        }
        self.merge(lower, name, value);
        true
    }

    /// Set a header bypassing the forbidden list. For the Client's own
    /// pre-dispatch headers (Host, Content-Length, ...).
    pub(crate) fn set_internal(&mut self, name: &str, value: &str) {
        self.merge(name.to_ascii_lowercase(), name, value);
    }

    /// Replace a header outright, keeping any existing canonical casing.
    pub(crate) fn replace_internal(&mut self, name: &str, value: &str) {
        let lower = name.to_ascii_lowercase();
        match self.entries.get_mut(&lower) {
            Some(entry) => entry.value = value.to_string(),
            None => self.merge(lower, name, value),
        }
    }

    fn merge(&mut self, lower: String, name: &str, value: &str) {
        match self.entries.get_mut(&lower) {
            Some(entry) => {
                entry.value.push_str(", ");
                entry.value.push_str(value);
            }
            None => {
                self.entries.insert(
                    lower,
                    HeaderEntry {
                        name: name.to_string(),
                        value: value.to_string(),
                    },
                );
            }
        }
    }

    /// Stored value for `name`, or `""`. Lookup is case-insensitive.
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|e| e.value.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical `(name, value)` pairs, for handing to the transport.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .values()
            .map(|e| (e.name.clone(), e.value.clone()))
            .collect()
    }
}

/// Join response headers as `Name: value\r\n` pairs with the trailing
/// separator trimmed. Cookie-setting headers are excluded.
pub(crate) fn format_response_headers(headers: &BTreeMap<String, String>) -> String {
    let mut result = String::new();
    for (name, value) in headers {
        if name == "set-cookie" || name == "set-cookie2" {
            continue;
        }
        result.push_str(name);
        result.push_str(": ");
        result.push_str(value);
        result.push_str("\r\n");
    }
    result.truncate(result.len().saturating_sub(2));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HeaderTable {
        let _ = env_logger::builder().is_test(true).try_init();
        HeaderTable::new("fetchline-test")
    }

    #[test]
    fn defaults_present_after_new_and_reset() {
        let mut t = table();
        assert_eq!(t.get("user-agent"), "fetchline-test");
        assert_eq!(t.get("Accept"), "*/*");
        assert_eq!(t.len(), 2);

        t.set("X-Custom", "1");
        t.reset();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("x-custom"), "");
    }

    #[test]
    fn same_name_any_casing_accumulates_in_call_order() {
        let mut t = table();
        assert!(t.set("X-Token", "a"));
        assert!(t.set("x-token", "b"));
        assert!(t.set("X-TOKEN", "c"));

        assert_eq!(t.get("x-ToKeN"), "a, b, c");
        // Canonical name is the casing of the first call
        let pairs = t.to_pairs();
        assert!(pairs.iter().any(|(n, v)| n == "X-Token" && v == "a, b, c"));
    }

    #[test]
    fn forbidden_header_is_a_silent_no_op() {
        let mut t = table();
        let before = t.to_pairs();
        assert!(!t.set("Content-Length", "42"));
        assert!(!t.set("HOST", "evil.example"));
        assert!(!t.set("Transfer-Encoding", "chunked"));
        assert_eq!(t.to_pairs(), before);
    }

    #[test]
    fn internal_set_bypasses_the_forbidden_list() {
        let mut t = table();
        t.set_internal("Host", "localhost:8080");
        assert_eq!(t.get("host"), "localhost:8080");

        t.replace_internal("Host", "localhost");
        assert_eq!(t.get("host"), "localhost");
    }

    #[test]
    fn forbidden_methods_rejected_any_casing() {
        assert!(!is_allowed_method("TRACE"));
        assert!(!is_allowed_method("track"));
        assert!(!is_allowed_method("Connect"));
        assert!(is_allowed_method("GET"));
        assert!(is_allowed_method("POST"));
    }

    #[test]
    fn response_header_join_excludes_cookies_and_trims() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        headers.insert("set-cookie".to_string(), "a=1".to_string());
        headers.insert("set-cookie2".to_string(), "b=2".to_string());
        headers.insert("x-thing".to_string(), "yes".to_string());

        assert_eq!(
            format_response_headers(&headers),
            "content-type: text/html\r\nx-thing: yes"
        );
        assert_eq!(format_response_headers(&BTreeMap::new()), "");
    }
}
