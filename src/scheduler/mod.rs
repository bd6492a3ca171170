//! Job scheduler
//!
//! Accepts analysis requests, bounds the number of concurrently running
//! audits and moves each request's scan job through
//! `Queued → Running → {Completed, Failed}` (`Cancelled` from either
//! non-terminal state). Status reads only touch the in-memory registry and
//! never wait on an audit.

mod registry;
mod runner;

pub use registry::JobRegistry;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auditor::PageAuditor;
use crate::config::ScanConfig;
use crate::error::{FailureKind, ScanError};
use crate::models::{AnalysisRequest, JobError, JobId, JobState, ScanJob, ScanSettings};
use crate::security::validate_target_url;
use crate::store::ResultStore;

pub(crate) struct SchedulerInner {
    config: ScanConfig,
    auditor: Arc<dyn PageAuditor>,
    store: Arc<dyn ResultStore>,
    registry: JobRegistry,
    slots: Arc<Semaphore>,
}

impl SchedulerInner {
    /// Mirror a job snapshot into the store
    ///
    /// Bookkeeping only: a failure here is logged and never changes the
    /// job's state.
    fn persist(&self, job: &ScanJob) {
        if let Err(e) = self.store.record_job(job) {
            error!(
                request_id = %job.request_id,
                attempt = job.attempt,
                state = job.state.as_str(),
                error = %format!("{:#}", e),
                "failed to record scan job"
            );
        }
        if let Err(e) = self.store.update_request_status(job.request_id, job.state) {
            error!(
                request_id = %job.request_id,
                state = job.state.as_str(),
                error = %format!("{:#}", e),
                "failed to update request status"
            );
        }
    }
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(config: ScanConfig, auditor: Arc<dyn PageAuditor>, store: Arc<dyn ResultStore>) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_concurrent_audits.max(1)));
        Self {
            inner: Arc::new(SchedulerInner {
                config,
                auditor,
                store,
                registry: JobRegistry::new(),
                slots,
            }),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.inner.config
    }

    pub fn auditor(&self) -> &Arc<dyn PageAuditor> {
        &self.inner.auditor
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.inner.store
    }

    /// Accept a new analysis request and start (or queue) its first attempt
    ///
    /// Invalid input is rejected before anything is registered or stored.
    pub fn submit(&self, mut request: AnalysisRequest) -> Result<JobId, ScanError> {
        let target = validate_target_url(&request.url).map_err(|e| ScanError::InvalidRequest(format!("{:#}", e)))?;
        validate_settings(&request.settings)?;
        // Canonical form, so every spelling of a page shares one history
        request.url = target.to_string();

        let permit = Arc::clone(&self.inner.slots).try_acquire_owned().ok();
        let state = if permit.is_some() { JobState::Running } else { JobState::Queued };

        let job = ScanJob::new(request.id, 1, state);
        request.status = state;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.inner.registry.register(request.clone(), job.clone(), cancel_tx)?;

        if let Err(e) = self.inner.store.save_request(&request) {
            self.inner.registry.remove(&request.id);
            error!(request_id = %request.id, error = %format!("{:#}", e), "failed to store analysis request");
            return Err(ScanError::persistence(e));
        }
        self.inner.persist(&job);

        info!(
            request_id = %request.id,
            url = %request.url,
            wcag_level = request.settings.wcag_level.as_str(),
            state = state.as_str(),
            "scan submitted"
        );

        let job_id = job.id();
        tokio::spawn(runner::run_attempt(
            Arc::clone(&self.inner),
            request,
            job_id,
            permit,
            cancel_rx,
        ));
        Ok(job_id)
    }

    /// Latest known snapshot of the request's current attempt
    pub fn status(&self, request_id: Uuid) -> Result<ScanJob, ScanError> {
        self.ensure_loaded(request_id)?;
        self.inner
            .registry
            .snapshot(&request_id)
            .ok_or_else(|| not_found(request_id))
    }

    /// Start a new attempt for a request whose current attempt is terminal
    pub fn retrigger(&self, request_id: Uuid) -> Result<JobId, ScanError> {
        self.ensure_loaded(request_id)?;

        let permit = Arc::clone(&self.inner.slots).try_acquire_owned().ok();
        let state = if permit.is_some() { JobState::Running } else { JobState::Queued };
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let inner = &self.inner;
        let (request, job) = inner
            .registry
            .begin_attempt(&request_id, state, cancel_tx, |job| inner.persist(job))
            .map_err(|e| {
                if matches!(e, ScanError::Conflict(_)) {
                    warn!(request_id = %request_id, "retrigger rejected: scan already in flight");
                }
                e
            })?;

        info!(
            request_id = %request_id,
            attempt = job.attempt,
            state = state.as_str(),
            "scan retriggered"
        );

        let job_id = job.id();
        tokio::spawn(runner::run_attempt(Arc::clone(inner), request, job_id, permit, cancel_rx));
        Ok(job_id)
    }

    /// Best-effort cancellation of the in-flight attempt
    ///
    /// The job is `Cancelled` as soon as this returns; the audit itself is
    /// aborted asynchronously. Cancelling a finished job returns it unchanged.
    pub fn cancel(&self, request_id: Uuid) -> Result<ScanJob, ScanError> {
        self.ensure_loaded(request_id)?;
        let inner = &self.inner;
        let job = inner
            .registry
            .cancel(&request_id, |job| inner.persist(job))
            .ok_or_else(|| not_found(request_id))?;

        if job.state == JobState::Cancelled {
            info!(request_id = %request_id, attempt = job.attempt, "scan cancellation requested");
        }
        Ok(job)
    }

    /// Every attempt for a request, oldest first
    pub fn history(&self, request_id: Uuid) -> Result<Vec<ScanJob>, ScanError> {
        self.ensure_loaded(request_id)?;
        self.inner
            .registry
            .history(&request_id)
            .ok_or_else(|| not_found(request_id))
    }

    /// The request with its live status
    pub fn get_request(&self, request_id: Uuid) -> Result<AnalysisRequest, ScanError> {
        if let Some(request) = self.inner.registry.request(&request_id) {
            return Ok(request);
        }
        self.inner
            .store
            .get_request(request_id)
            .map_err(ScanError::persistence)?
            .ok_or_else(|| not_found(request_id))
    }

    /// Poll until the current attempt is terminal
    pub async fn wait_for_terminal(&self, request_id: Uuid, poll_interval: Duration) -> Result<ScanJob, ScanError> {
        loop {
            let job = self.status(request_id)?;
            if job.state.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub fn running_count(&self) -> usize {
        self.inner.registry.count_in_state(JobState::Running)
    }

    pub fn queued_count(&self) -> usize {
        self.inner.registry.count_in_state(JobState::Queued)
    }

    /// Load a request known only to the store into the registry
    ///
    /// Attempts recorded as in flight belong to a scheduler that is gone, so
    /// they are closed out here: a queued attempt becomes `Cancelled`, a
    /// running one `Failed(Unknown)`.
    fn ensure_loaded(&self, request_id: Uuid) -> Result<(), ScanError> {
        if self.inner.registry.contains(&request_id) {
            return Ok(());
        }

        let store = &self.inner.store;
        let request = store
            .get_request(request_id)
            .map_err(ScanError::persistence)?
            .ok_or_else(|| not_found(request_id))?;
        let mut jobs = store.list_jobs(request_id).map_err(ScanError::persistence)?;

        if let Some(last) = jobs.last_mut() {
            let closed = match last.state {
                JobState::Queued => last.transition(JobState::Cancelled),
                JobState::Running => last.fail(JobError {
                    kind: FailureKind::Unknown,
                    message: "scan was interrupted before it finished".to_string(),
                }),
                _ => false,
            };
            if closed {
                warn!(request_id = %request_id, attempt = last.attempt, "closing out interrupted scan attempt");
                self.inner.persist(last);
            }
        }

        if !self.inner.registry.restore(request, jobs) {
            return Err(ScanError::NotFound(format!(
                "no scan job recorded for analysis request {}",
                request_id
            )));
        }
        Ok(())
    }
}

fn not_found(request_id: Uuid) -> ScanError {
    ScanError::NotFound(format!("analysis request {} not found", request_id))
}

fn validate_settings(settings: &ScanSettings) -> Result<(), ScanError> {
    if settings.viewport.width == 0 || settings.viewport.height == 0 {
        return Err(ScanError::InvalidRequest(format!(
            "viewport must be non-empty, got {}x{}",
            settings.viewport.width, settings.viewport.height
        )));
    }
    if settings.timeout_ms == Some(0) {
        return Err(ScanError::InvalidRequest("timeoutMs must be positive".to_string()));
    }
    Ok(())
}
