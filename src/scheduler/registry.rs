//! In-memory job registry
//!
//! One entry per analysis request. Map guards are held only for in-memory
//! reads and updates, never across store calls, so status reads stay cheap
//! while a job is being persisted. Writers for one request id serialize on
//! that entry's writer lock, which also covers the `persist` hook, so stored
//! snapshots are written in transition order.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::ScanError;
use crate::models::{AnalysisRequest, JobError, JobId, JobState, ScanJob};

pub(crate) struct JobEntry {
    pub request: AnalysisRequest,
    pub current: ScanJob,
    /// Earlier attempts, oldest first
    pub history: Vec<ScanJob>,
    cancel: Option<oneshot::Sender<()>>,
    /// Taken by writers, never by readers
    writer: Arc<Mutex<()>>,
}

impl JobEntry {
    fn new(request: AnalysisRequest, current: ScanJob, history: Vec<ScanJob>, cancel: Option<oneshot::Sender<()>>) -> Self {
        let mut entry = Self {
            request,
            current,
            history,
            cancel,
            writer: Arc::new(Mutex::new(())),
        };
        entry.sync_status();
        entry
    }

    fn sync_status(&mut self) {
        self.request.status = self.current.state;
    }

    fn is_current(&self, id: JobId) -> bool {
        self.current.attempt == id.attempt
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: DashMap<Uuid, JobEntry>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, request_id: &Uuid) -> bool {
        self.jobs.contains_key(request_id)
    }

    /// Register a brand new request with its first attempt
    pub fn register(
        &self,
        request: AnalysisRequest,
        job: ScanJob,
        cancel: oneshot::Sender<()>,
    ) -> Result<(), ScanError> {
        match self.jobs.entry(request.id) {
            Entry::Occupied(_) => Err(ScanError::Conflict(format!(
                "analysis request {} is already registered",
                request.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(JobEntry::new(request, job, Vec::new(), Some(cancel)));
                Ok(())
            }
        }
    }

    /// Rebuild an entry from stored attempts (oldest first); no-op if already present
    pub fn restore(&self, request: AnalysisRequest, mut jobs: Vec<ScanJob>) -> bool {
        let Some(current) = jobs.pop() else {
            return false;
        };
        self.jobs
            .entry(request.id)
            .or_insert_with(|| JobEntry::new(request, current, jobs, None));
        true
    }

    pub fn remove(&self, request_id: &Uuid) {
        self.jobs.remove(request_id);
    }

    pub fn snapshot(&self, request_id: &Uuid) -> Option<ScanJob> {
        self.jobs.get(request_id).map(|entry| entry.current.clone())
    }

    pub fn request(&self, request_id: &Uuid) -> Option<AnalysisRequest> {
        self.jobs.get(request_id).map(|entry| entry.request.clone())
    }

    /// All attempts for a request, oldest first, current attempt last
    pub fn history(&self, request_id: &Uuid) -> Option<Vec<ScanJob>> {
        self.jobs.get(request_id).map(|entry| {
            let mut attempts = entry.history.clone();
            attempts.push(entry.current.clone());
            attempts
        })
    }

    fn writer(&self, request_id: &Uuid) -> Option<Arc<Mutex<()>>> {
        self.jobs.get(request_id).map(|entry| Arc::clone(&entry.writer))
    }

    /// Start a new attempt unless one is already queued or running
    pub fn begin_attempt(
        &self,
        request_id: &Uuid,
        initial: JobState,
        cancel: oneshot::Sender<()>,
        persist: impl FnOnce(&ScanJob),
    ) -> Result<(AnalysisRequest, ScanJob), ScanError> {
        let missing = || ScanError::NotFound(format!("analysis request {} not found", request_id));
        let writer = self.writer(request_id).ok_or_else(missing)?;
        let _writing = writer.lock();

        let (request, job) = {
            let mut entry = self.jobs.get_mut(request_id).ok_or_else(missing)?;
            if entry.current.state.is_in_flight() {
                return Err(ScanError::Conflict(format!(
                    "scan for {} is already {} (attempt {})",
                    request_id,
                    entry.current.state.as_str(),
                    entry.current.attempt
                )));
            }

            let next = ScanJob::new(*request_id, entry.current.attempt + 1, initial);
            let finished = std::mem::replace(&mut entry.current, next);
            entry.history.push(finished);
            entry.cancel = Some(cancel);
            entry.sync_status();
            (entry.request.clone(), entry.current.clone())
        };

        persist(&job);
        Ok((request, job))
    }

    /// Move the given attempt forward; `None` if it is no longer current or the move is illegal
    pub fn transition(&self, id: JobId, next: JobState, persist: impl FnOnce(&ScanJob)) -> Option<ScanJob> {
        let writer = self.writer(&id.request_id)?;
        let _writing = writer.lock();

        let job = {
            let mut entry = self.jobs.get_mut(&id.request_id)?;
            if !entry.is_current(id) || !entry.current.transition(next) {
                return None;
            }
            if next.is_terminal() {
                entry.cancel = None;
            }
            entry.sync_status();
            entry.current.clone()
        };

        persist(&job);
        Some(job)
    }

    pub fn fail(&self, id: JobId, error: JobError, persist: impl FnOnce(&ScanJob)) -> Option<ScanJob> {
        let writer = self.writer(&id.request_id)?;
        let _writing = writer.lock();

        let job = {
            let mut entry = self.jobs.get_mut(&id.request_id)?;
            if !entry.is_current(id) || !entry.current.fail(error) {
                return None;
            }
            entry.cancel = None;
            entry.sync_status();
            entry.current.clone()
        };

        persist(&job);
        Some(job)
    }

    /// Finish a running attempt
    ///
    /// `settle` runs only while the attempt is still `Running` and holds the
    /// writer lock throughout, so a concurrent cancel either lands first (and
    /// `settle` never runs) or waits until the job is terminal. Readers are
    /// not held up. `Ok` completes the job, `Err` fails it.
    pub fn settle(
        &self,
        id: JobId,
        settle: impl FnOnce() -> Result<(), JobError>,
        persist: impl FnOnce(&ScanJob),
    ) -> Option<ScanJob> {
        let writer = self.writer(&id.request_id)?;
        let _writing = writer.lock();

        let running = self
            .jobs
            .get(&id.request_id)
            .map_or(false, |entry| entry.is_current(id) && entry.current.state == JobState::Running);
        if !running {
            return None;
        }

        let outcome = settle();

        let job = {
            let mut entry = self.jobs.get_mut(&id.request_id)?;
            match outcome {
                Ok(()) => entry.current.transition(JobState::Completed),
                Err(error) => entry.current.fail(error),
            };
            entry.cancel = None;
            entry.sync_status();
            entry.current.clone()
        };

        persist(&job);
        Some(job)
    }

    /// Cancel the in-flight attempt, if any, and signal its runner
    ///
    /// Terminal attempts are returned unchanged. `None` if the request is unknown.
    pub fn cancel(&self, request_id: &Uuid, persist: impl FnOnce(&ScanJob)) -> Option<ScanJob> {
        let writer = self.writer(request_id)?;
        let _writing = writer.lock();

        let (job, cancelled) = {
            let mut entry = self.jobs.get_mut(request_id)?;
            let cancelled = entry.current.transition(JobState::Cancelled);
            if cancelled {
                if let Some(signal) = entry.cancel.take() {
                    // The runner may already be gone; the state change is what counts
                    let _ = signal.send(());
                }
                entry.sync_status();
            }
            (entry.current.clone(), cancelled)
        };

        if cancelled {
            persist(&job);
        }
        Some(job)
    }

    /// Number of current attempts in `state`
    pub fn count_in_state(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|entry| entry.current.state == state).count()
    }
}
