//! Analysis request commands
//!
//! Creation and lookup of analysis requests and their results

use uuid::Uuid;

use super::AppState;
use crate::error::ScanError;
use crate::models::{AnalysisRequest, AnalysisResult, ScanSettings, Scope};

pub const DEFAULT_RECENT_LIMIT: usize = 10;
pub const MAX_RECENT_LIMIT: usize = 100;

/// Create an analysis request and schedule its first scan
///
/// # Arguments
/// * `url` - Absolute http(s) URL to audit
/// * `requester_ref` - Owning user, `None` for an anonymous (public) request
/// * `settings` - WCAG level, viewport and optional timeout
///
/// Returns: The stored request, status `Queued` or `Running`
pub async fn create_analysis_request(
    state: &AppState,
    url: &str,
    requester_ref: Option<String>,
    settings: ScanSettings,
) -> Result<AnalysisRequest, ScanError> {
    let requester_ref = requester_ref.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
    let request = AnalysisRequest::new(url, requester_ref, settings);
    let request_id = request.id;

    state.scheduler.submit(request)?;
    state.scheduler.get_request(request_id)
}

/// Get an analysis request with its live status
pub async fn get_analysis_request(state: &AppState, request_id: Uuid) -> Result<AnalysisRequest, ScanError> {
    state.scheduler.get_request(request_id)
}

/// Get the result of the request's latest completed attempt
///
/// Fails with `NotFound` both for unknown requests and for requests that
/// have not produced a result yet; the message tells the two apart.
pub async fn get_analysis_result(state: &AppState, request_id: Uuid) -> Result<AnalysisResult, ScanError> {
    if let Some(result) = state.store.get(request_id).map_err(ScanError::persistence)? {
        return Ok(result);
    }

    let request = state.scheduler.get_request(request_id)?;
    Err(ScanError::NotFound(format!(
        "no result for analysis request {} yet (status: {})",
        request_id, request.status
    )))
}

/// List a user's analysis requests, newest first
pub async fn get_user_analysis_requests(
    state: &AppState,
    user: &str,
    limit: Option<usize>,
) -> Result<Vec<AnalysisRequest>, ScanError> {
    let scope = user_scope(user)?;
    state
        .store
        .list_requests(&scope, limit)
        .map_err(ScanError::persistence)
}

/// List a user's analysis results, newest first
pub async fn get_user_analysis_results(state: &AppState, user: &str) -> Result<Vec<AnalysisResult>, ScanError> {
    let scope = user_scope(user)?;
    let mut results = state.store.list_by_scope(&scope).map_err(ScanError::persistence)?;
    results.reverse();
    Ok(results)
}

/// Most recent anonymous analysis requests
///
/// # Arguments
/// * `limit` - Number of requests (default 10, capped at 100)
pub async fn get_recent_analyses(state: &AppState, limit: Option<usize>) -> Result<Vec<AnalysisRequest>, ScanError> {
    let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
    state
        .store
        .list_public_requests(Some(limit))
        .map_err(ScanError::persistence)
}

pub(super) fn user_scope(user: &str) -> Result<Scope, ScanError> {
    let user = user.trim();
    if user.is_empty() {
        return Err(ScanError::InvalidRequest("user reference cannot be empty".to_string()));
    }
    Ok(Scope::user(user))
}
