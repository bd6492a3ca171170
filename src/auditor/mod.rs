//! Page auditor adapter
//!
//! The browser-automation and accessibility-rule engine lives outside this
//! crate. The scheduler only depends on the `PageAuditor` capability, so the
//! concrete engine can be swapped or mocked.

pub mod classify;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuditFailure;
use crate::models::{RawViolationSet, Viewport, WcagLevel};

pub use classify::classify_failure_message;
pub use http::HttpPageAuditor;

/// Options forwarded to the auditor for a single page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditOptions {
    pub wcag_level: WcagLevel,
    pub viewport: Viewport,
    pub timeout_ms: u64,
}

/// Health report returned by `PageAuditor::health_check`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditorHealth {
    pub healthy: bool,
    pub detail: String,
}

#[async_trait]
pub trait PageAuditor: Send + Sync {
    /// Render `url` and return the raw rule violations found on it
    ///
    /// Dropping the returned future must be enough to release whatever the
    /// audit holds; the scheduler aborts audits on timeout and cancellation.
    async fn audit(&self, url: &str, options: &AuditOptions) -> Result<RawViolationSet, AuditFailure>;

    async fn health_check(&self) -> AuditorHealth {
        AuditorHealth {
            healthy: true,
            detail: "no health probe available".to_string(),
        }
    }
}
