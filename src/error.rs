//! Error taxonomy
//!
//! `ScanError` is what callers of the scheduler and the commands layer see.
//! `AuditFailure` is what a page auditor reports; it never reaches a caller
//! as an error, it ends up classified inside a `Failed` job instead.

use serde::{Deserialize, Serialize};

/// Errors surfaced synchronously to callers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl ScanError {
    /// Stable machine-readable tag
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::InvalidRequest(_) => "invalid_request",
            ScanError::NotFound(_) => "not_found",
            ScanError::Conflict(_) => "conflict",
            ScanError::Persistence(_) => "persistence_failure",
        }
    }

    pub fn persistence(err: anyhow::Error) -> Self {
        ScanError::Persistence(format!("{:#}", err))
    }
}

/// Classification of a failed audit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind")]
pub enum FailureKind {
    NavigationError,
    Timeout,
    HttpError { status: u16 },
    DnsError,
    ConnectionRefused,
    Unknown,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NavigationError => "NavigationError",
            FailureKind::Timeout => "Timeout",
            FailureKind::HttpError { .. } => "HttpError",
            FailureKind::DnsError => "DnsError",
            FailureKind::ConnectionRefused => "ConnectionRefused",
            FailureKind::Unknown => "Unknown",
        }
    }

    /// Rebuild a kind from its stored tag and optional HTTP status
    pub fn from_parts(kind: &str, status: Option<u16>) -> Option<Self> {
        match kind {
            "NavigationError" => Some(FailureKind::NavigationError),
            "Timeout" => Some(FailureKind::Timeout),
            "HttpError" => Some(FailureKind::HttpError {
                status: status.unwrap_or(0),
            }),
            "DnsError" => Some(FailureKind::DnsError),
            "ConnectionRefused" => Some(FailureKind::ConnectionRefused),
            "Unknown" => Some(FailureKind::Unknown),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FailureKind::HttpError { status } => Some(*status),
            _ => None,
        }
    }

    /// Whether a caller-initiated retrigger has a reasonable chance to succeed
    pub fn is_retriable(&self) -> bool {
        match self {
            FailureKind::Timeout | FailureKind::ConnectionRefused => true,
            FailureKind::HttpError { status } => *status >= 500 || *status == 429,
            FailureKind::NavigationError | FailureKind::DnsError | FailureKind::Unknown => false,
        }
    }

    /// Human-readable message category for presentation layers
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::NavigationError => {
                "Unable to access the website. Check that the URL is correct and the site is reachable."
            }
            FailureKind::Timeout => "The website took too long to respond. Try again later.",
            FailureKind::HttpError { status: 404 } => {
                "The webpage was not found (404). Check that the URL is correct."
            }
            FailureKind::HttpError { status: 401 } | FailureKind::HttpError { status: 403 } => {
                "Access to the webpage is forbidden. The site may be blocking automated access."
            }
            FailureKind::HttpError { status } if *status >= 500 => {
                "The website is experiencing server issues. Try again later."
            }
            FailureKind::HttpError { .. } => "The website answered with an error status.",
            FailureKind::DnsError => "The website domain could not be found. Check the URL.",
            FailureKind::ConnectionRefused => {
                "Connection to the website was refused. The site may be down or blocking connections."
            }
            FailureKind::Unknown => "The analysis failed. Please try again.",
        }
    }
}

/// Failure reported by a page auditor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} audit failure: {}", .kind.as_str(), .message)]
pub struct AuditFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl AuditFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            FailureKind::Timeout,
            format!("timeout: audit exceeded {} ms", timeout_ms),
        )
    }
}
