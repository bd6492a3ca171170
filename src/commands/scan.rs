//! Scan management commands
//!
//! Status polling, retriggering and cancellation of scan jobs, plus the
//! auditor health probe

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;
use crate::auditor::AuditorHealth;
use crate::error::ScanError;
use crate::models::{JobId, JobState, JobStatus, ScanJob};

/// Status payload returned to pollers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanStatusView {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub status: JobStatus,
    /// Presentation text for failed or cancelled scans
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl ScanStatusView {
    pub fn from_job(job: &ScanJob) -> Self {
        let user_message = match (&job.state, &job.last_error) {
            (JobState::Failed, Some(error)) => Some(error.kind.user_message().to_string()),
            (JobState::Cancelled, _) => Some("The scan was cancelled.".to_string()),
            _ => None,
        };
        Self {
            request_id: job.request_id,
            status: job.status(),
            user_message,
        }
    }
}

/// Get the status of a request's current scan attempt
///
/// Never fails because of the scan's own outcome: a failed audit is reported
/// as `state: Failed` with an `errorKind`.
pub async fn get_scan_status(state: &AppState, request_id: Uuid) -> Result<ScanStatusView, ScanError> {
    let job = state.scheduler.status(request_id)?;
    Ok(ScanStatusView::from_job(&job))
}

/// Start a new scan attempt for an existing request
///
/// Returns: `Conflict` while an attempt is queued or running
pub async fn trigger_scan(state: &AppState, request_id: Uuid) -> Result<JobId, ScanError> {
    state.scheduler.retrigger(request_id)
}

/// Cancel the request's in-flight scan, if any
pub async fn cancel_scan(state: &AppState, request_id: Uuid) -> Result<ScanStatusView, ScanError> {
    let job = state.scheduler.cancel(request_id)?;
    Ok(ScanStatusView::from_job(&job))
}

/// Every attempt for a request, oldest first
pub async fn get_scan_history(state: &AppState, request_id: Uuid) -> Result<Vec<ScanStatusView>, ScanError> {
    let attempts = state.scheduler.history(request_id)?;
    Ok(attempts.iter().map(ScanStatusView::from_job).collect())
}

/// Probe the page auditor
pub async fn test_scanner(state: &AppState) -> AuditorHealth {
    let health = state.scheduler.auditor().health_check().await;
    if health.healthy {
        tracing::info!(detail = %health.detail, "auditor health check passed");
    } else {
        tracing::warn!(detail = %health.detail, "auditor health check failed");
    }
    health
}
