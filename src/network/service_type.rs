use std::sync::OnceLock;

use regex::Regex;

/// Substring that marks a datagram as a discovery request.
pub const MSEARCH_MARKER: &str = "M-SEARCH";

fn st_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\r\nST:(.*?)\r\n").expect("static ST header pattern"))
}

fn valid_st() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._-]+(?::[A-Za-z0-9._-]+)+$").expect("static ST value pattern")
    })
}

pub fn is_msearch(payload: &str) -> bool {
    payload.contains(MSEARCH_MARKER)
}

/// Value of the `ST:` header, trimmed. Header name matching ignores case.
pub fn extract_service_type(payload: &str) -> Option<&str> {
    st_header()
        .captures(payload)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// `segment(:segment)+` where a segment is `[A-Za-z0-9._-]+`.
///
/// Anything else is treated as the signature of a scanner rather than a real
/// control point.
pub fn is_valid_service_type(st: &str) -> bool {
    valid_st().is_match(st)
}
