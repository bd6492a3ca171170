//! Caller-facing operations
//!
//! The operation surface a UI or HTTP layer would expose, as plain async
//! functions over an explicitly constructed `AppState`:
//!
//! Analysis Commands (6):
//! - create_analysis_request: Validate, store and schedule a new scan
//! - get_analysis_request: Request with live status
//! - get_analysis_result: Latest result for a request
//! - get_user_analysis_requests / get_user_analysis_results: Per-user listings
//! - get_recent_analyses: Most recent anonymous requests
//!
//! Scan Commands (5):
//! - get_scan_status: Status of the current attempt plus a user-facing message
//! - trigger_scan: Start a new attempt (Conflict while one is in flight)
//! - cancel_scan: Best-effort cancellation
//! - get_scan_history: Every attempt for a request
//! - test_scanner: Auditor health probe
//!
//! History Commands (3):
//! - get_analysis_by_url: Results for one URL, newest first
//! - get_historical_comparison: Newest result against its baseline
//! - get_violation_analysis: Category and severity breakdown of a result
//!
//! Analytics Commands (1):
//! - get_analytics: Summary over a scope and time range

pub mod analysis;
pub mod analytics;
pub mod history;
pub mod scan;

#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::auditor::{HttpPageAuditor, PageAuditor};
use crate::config::ScanConfig;
use crate::scheduler::Scheduler;
use crate::store::{ResultStore, SqliteResultStore};

pub use analysis::{
    create_analysis_request, get_analysis_request, get_analysis_result, get_recent_analyses,
    get_user_analysis_requests, get_user_analysis_results,
};
pub use analytics::get_analytics;
pub use history::{get_analysis_by_url, get_historical_comparison, get_result_comparison, get_violation_analysis};
pub use scan::{cancel_scan, get_scan_history, get_scan_status, test_scanner, trigger_scan};

/// Shared state handed to every command
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Scheduler,
    pub store: Arc<dyn ResultStore>,
}

impl AppState {
    pub fn new(scheduler: Scheduler) -> Self {
        let store = Arc::clone(scheduler.store());
        Self { scheduler, store }
    }

    /// Wire the HTTP auditor and SQLite store described by `config`
    pub fn from_config(config: ScanConfig) -> Result<Self> {
        let store: Arc<dyn ResultStore> = Arc::new(
            SqliteResultStore::open(&config.data_dir)
                .with_context(|| format!("Failed to open result store in {:?}", config.data_dir))?,
        );
        let auditor: Arc<dyn PageAuditor> =
            Arc::new(HttpPageAuditor::new(config.auditor_url.clone(), config.timeout_grace())?);

        tracing::info!(
            auditor = %config.auditor_url,
            data_dir = %config.data_dir.display(),
            max_concurrent_audits = config.max_concurrent_audits,
            "scan engine ready"
        );

        Ok(Self::new(Scheduler::new(config, auditor, store)))
    }
}
