//! Execution of one scan attempt
//!
//! Runs as its own tokio task: wait for a slot (if queued), drive the
//! auditor under a timeout, analyze, persist. Every state change goes through
//! the registry so it is checked against the attempt number and the
//! transition table. Registry calls that reach the store run on the blocking
//! pool.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, OwnedSemaphorePermit};
use tracing::{debug, error, info, warn};

use super::SchedulerInner;
use crate::analyzer;
use crate::auditor::AuditOptions;
use crate::error::{AuditFailure, FailureKind};
use crate::models::{AnalysisRequest, AnalysisResult, JobError, JobId, JobState, RawViolationSet};

pub(super) async fn run_attempt(
    inner: Arc<SchedulerInner>,
    request: AnalysisRequest,
    job_id: JobId,
    permit: Option<OwnedSemaphorePermit>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let was_queued = permit.is_none();

    // Held until the attempt reaches a terminal state
    let _permit = match permit {
        Some(permit) => permit,
        None => {
            debug!(request_id = %job_id.request_id, attempt = job_id.attempt, "waiting for an audit slot");
            tokio::select! {
                _ = &mut cancel_rx => {
                    mark_cancelled(&inner, job_id).await;
                    return;
                }
                acquired = Arc::clone(&inner.slots).acquire_owned() => match acquired {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Closed semaphore: nothing will ever run, so the attempt cannot stay queued
                        mark_cancelled(&inner, job_id).await;
                        return;
                    }
                },
            }
        }
    };

    if was_queued {
        let started = on_store(&inner, job_id, move |inner| {
            inner.registry.transition(job_id, JobState::Running, |job| inner.persist(job))
        })
        .await;
        if started.is_none() {
            debug!(request_id = %job_id.request_id, attempt = job_id.attempt, "attempt left the queue before starting");
            return;
        }
        info!(request_id = %job_id.request_id, attempt = job_id.attempt, url = %request.url, "scan started");
    }

    let timeout_ms = inner.config.effective_timeout_ms(request.settings.timeout_ms);
    let outcome = audit(&inner, &request, timeout_ms, &mut cancel_rx).await;

    match outcome {
        None => mark_cancelled(&inner, job_id).await,
        Some(Err(failure)) => {
            warn!(
                request_id = %job_id.request_id,
                attempt = job_id.attempt,
                url = %request.url,
                error_kind = failure.kind.as_str(),
                error = %failure.message,
                "audit failed"
            );
            let error = JobError::from(failure);
            on_store(&inner, job_id, move |inner| inner.registry.fail(job_id, error, |job| inner.persist(job))).await;
        }
        Some(Ok(raw)) => complete(&inner, &request, job_id, raw).await,
    }
}

/// Run registry work that touches the store on the blocking pool
async fn on_store<T, F>(inner: &Arc<SchedulerInner>, job_id: JobId, work: F) -> Option<T>
where
    F: FnOnce(&SchedulerInner) -> Option<T> + Send + 'static,
    T: Send + 'static,
{
    let inner = Arc::clone(inner);
    match tokio::task::spawn_blocking(move || work(&inner)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                request_id = %job_id.request_id,
                attempt = job_id.attempt,
                error = %e,
                "store task ended unexpectedly"
            );
            None
        }
    }
}

/// Drive the auditor; `None` means the attempt was cancelled
///
/// The audit runs in its own task so that timeout and cancellation can drop
/// it without waiting for the auditor to notice.
async fn audit(
    inner: &SchedulerInner,
    request: &AnalysisRequest,
    timeout_ms: u64,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Option<Result<RawViolationSet, AuditFailure>> {
    let options = AuditOptions {
        wcag_level: request.settings.wcag_level,
        viewport: request.settings.viewport,
        timeout_ms,
    };
    let auditor = Arc::clone(&inner.auditor);
    let url = request.url.clone();
    let mut task = tokio::spawn(async move { auditor.audit(&url, &options).await });

    tokio::select! {
        _ = cancel_rx => {
            task.abort();
            None
        }
        finished = tokio::time::timeout(Duration::from_millis(timeout_ms), &mut task) => Some(match finished {
            Err(_) => {
                task.abort();
                Err(AuditFailure::timeout(timeout_ms))
            }
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AuditFailure::new(
                FailureKind::Unknown,
                format!("audit task ended unexpectedly: {}", join_error),
            )),
        }),
    }
}

async fn complete(inner: &Arc<SchedulerInner>, request: &AnalysisRequest, job_id: JobId, raw: RawViolationSet) {
    let findings = analyzer::analyze(&raw, request.settings.wcag_level);
    let result = AnalysisResult::from_findings(request, job_id.attempt, Utc::now(), findings);
    let score = result.score;
    let violations = result.violations.len();

    let settled = on_store(inner, job_id, move |inner| {
        let save = || {
            inner.store.save(&result).map(|_| ()).map_err(|e| {
                error!(
                    request_id = %job_id.request_id,
                    attempt = job_id.attempt,
                    error = %format!("{:#}", e),
                    "failed to persist analysis result; discarding audit output"
                );
                JobError {
                    kind: FailureKind::Unknown,
                    message: format!("persistence failure: {:#}", e),
                }
            })
        };
        inner.registry.settle(job_id, save, |job| inner.persist(job))
    })
    .await;

    match settled {
        Some(job) if job.state == JobState::Completed => info!(
            request_id = %job_id.request_id,
            attempt = job_id.attempt,
            url = %request.url,
            score,
            violations,
            "scan completed"
        ),
        Some(_) => {}
        None => debug!(
            request_id = %job_id.request_id,
            attempt = job_id.attempt,
            "attempt no longer running; audit output discarded"
        ),
    }
}

async fn mark_cancelled(inner: &Arc<SchedulerInner>, job_id: JobId) {
    let cancelled = on_store(inner, job_id, move |inner| {
        inner.registry.transition(job_id, JobState::Cancelled, |job| inner.persist(job))
    })
    .await;
    if cancelled.is_some() {
        info!(request_id = %job_id.request_id, attempt = job_id.attempt, "scan cancelled");
    }
}
