//! Shared fixtures for command tests

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::AppState;
use crate::auditor::{AuditOptions, PageAuditor};
use crate::config::ScanConfig;
use crate::error::AuditFailure;
use crate::models::{RawViolation, RawViolationSet};
use crate::scheduler::Scheduler;
use crate::store::MemoryResultStore;

/// Auditor answering every URL with the same violations after `delay`
pub struct FixedAuditor {
    pub delay: Duration,
    pub outcome: Result<RawViolationSet, AuditFailure>,
}

#[async_trait]
impl PageAuditor for FixedAuditor {
    async fn audit(&self, _url: &str, _options: &AuditOptions) -> Result<RawViolationSet, AuditFailure> {
        tokio::time::sleep(self.delay).await;
        self.outcome.clone()
    }
}

pub fn critical_and_minor() -> RawViolationSet {
    vec![
        RawViolation::new("color-contrast", "critical", 4),
        RawViolation::new("region", "minor", 2),
    ]
}

pub fn state_with(delay: Duration, outcome: Result<RawViolationSet, AuditFailure>) -> AppState {
    let auditor = Arc::new(FixedAuditor { delay, outcome });
    let store = Arc::new(MemoryResultStore::new());
    AppState::new(Scheduler::new(ScanConfig::default(), auditor, store))
}

pub fn state() -> AppState {
    state_with(Duration::from_millis(10), Ok(critical_and_minor()))
}
