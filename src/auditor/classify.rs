//! Failure classification for auditor error text
//!
//! Rendering engines report failures as free text ("net::ERR_NAME_NOT_RESOLVED",
//! "Navigation failed because page crashed", "HTTP 404"). This maps that text
//! onto `FailureKind` once, at the adapter edge; nothing past the adapter
//! inspects message strings.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::error;

use crate::error::FailureKind;

const HTTP_STATUS_PATTERN: &str = r"(?i)\b(?:HTTP|status(?: code)?)[ :/]*([1-5]\d\d)\b";

/// `None` only if the pattern fails to compile; status codes are then not extracted
static HTTP_STATUS: Lazy<Option<Regex>> = Lazy::new(|| match Regex::new(HTTP_STATUS_PATTERN) {
    Ok(re) => Some(re),
    Err(e) => {
        error!(error = %e, "invalid HTTP status pattern");
        None
    }
});

const DNS_MARKERS: &[&str] = &[
    "err_name_not_resolved",
    "enotfound",
    "getaddrinfo",
    "dns error",
    "failed to lookup address",
    "name or service not known",
];

const REFUSED_MARKERS: &[&str] = &[
    "err_connection_refused",
    "econnrefused",
    "connection refused",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "err_timed_out"];

const NAVIGATION_MARKERS: &[&str] = &[
    "navigation failed",
    "failed to load page",
    "err_aborted",
    "err_invalid_url",
    "net::err_",
    "page crashed",
];

/// Classify an auditor error message
///
/// Order matters: network-level causes are checked before the generic
/// navigation markers because engines wrap them ("Navigation failed:
/// net::ERR_NAME_NOT_RESOLVED").
pub fn classify_failure_message(message: &str) -> FailureKind {
    let lower = message.to_ascii_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if contains_any(DNS_MARKERS) {
        return FailureKind::DnsError;
    }
    if contains_any(REFUSED_MARKERS) {
        return FailureKind::ConnectionRefused;
    }
    if contains_any(TIMEOUT_MARKERS) {
        return FailureKind::Timeout;
    }
    if let Some(status) = HTTP_STATUS
        .as_ref()
        .and_then(|re| re.captures(message))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
    {
        if status >= 400 {
            return FailureKind::HttpError { status };
        }
    }
    if contains_any(NAVIGATION_MARKERS) {
        return FailureKind::NavigationError;
    }
    FailureKind::Unknown
}
