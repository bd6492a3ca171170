//! Durable storage for analysis requests, job attempts and results
//!
//! The scheduler and the history/analytics layers only see `ResultStore`.
//! Two implementations ship: an in-process map for tests and one-shot CLI
//! runs, and SQLite for everything else.

pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{AnalysisRequest, AnalysisResult, JobState, ScanJob, Scope};

pub use sqlite::SqliteResultStore;

#[cfg_attr(test, mockall::automock)]
pub trait ResultStore: Send + Sync {
    /// Persist a result; returns false if `(request_id, attempt)` was already stored
    fn save(&self, result: &AnalysisResult) -> Result<bool>;

    /// Latest attempt's result for a request
    fn get(&self, request_id: Uuid) -> Result<Option<AnalysisResult>>;

    fn get_attempt(&self, request_id: Uuid, attempt: u32) -> Result<Option<AnalysisResult>>;

    /// Results for `url`, newest first, restricted to `scanned_at < before` when given
    fn list_by_url(&self, url: &str, before: Option<DateTime<Utc>>) -> Result<Vec<AnalysisResult>>;

    /// Results in scope, oldest first
    fn list_by_scope(&self, scope: &Scope) -> Result<Vec<AnalysisResult>>;

    fn save_request(&self, request: &AnalysisRequest) -> Result<()>;

    fn get_request(&self, request_id: Uuid) -> Result<Option<AnalysisRequest>>;

    fn update_request_status(&self, request_id: Uuid, status: JobState) -> Result<()>;

    /// Requests in scope, newest first
    fn list_requests(&self, scope: &Scope, limit: Option<usize>) -> Result<Vec<AnalysisRequest>>;

    /// Anonymous requests, newest first
    fn list_public_requests(&self, limit: Option<usize>) -> Result<Vec<AnalysisRequest>>;

    /// Upsert a snapshot of one job attempt
    fn record_job(&self, job: &ScanJob) -> Result<()>;

    /// All recorded attempts of a request, oldest first
    fn list_jobs(&self, request_id: Uuid) -> Result<Vec<ScanJob>>;
}

#[derive(Default)]
struct MemoryInner {
    requests: HashMap<Uuid, AnalysisRequest>,
    jobs: HashMap<Uuid, Vec<ScanJob>>,
    results: Vec<AnalysisResult>,
}

/// Process-local store; contents vanish with the process
#[derive(Default)]
pub struct MemoryResultStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(requests: &mut [AnalysisRequest], limit: Option<usize>) -> Vec<AnalysisRequest> {
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let take = limit.unwrap_or(requests.len());
        requests.iter().take(take).cloned().collect()
    }
}

impl ResultStore for MemoryResultStore {
    fn save(&self, result: &AnalysisResult) -> Result<bool> {
        let mut inner = self.inner.write();
        let exists = inner
            .results
            .iter()
            .any(|r| r.request_id == result.request_id && r.attempt == result.attempt);
        if exists {
            return Ok(false);
        }
        inner.results.push(result.clone());
        Ok(true)
    }

    fn get(&self, request_id: Uuid) -> Result<Option<AnalysisResult>> {
        let inner = self.inner.read();
        Ok(inner
            .results
            .iter()
            .filter(|r| r.request_id == request_id)
            .max_by_key(|r| r.attempt)
            .cloned())
    }

    fn get_attempt(&self, request_id: Uuid, attempt: u32) -> Result<Option<AnalysisResult>> {
        let inner = self.inner.read();
        Ok(inner
            .results
            .iter()
            .find(|r| r.request_id == request_id && r.attempt == attempt)
            .cloned())
    }

    fn list_by_url(&self, url: &str, before: Option<DateTime<Utc>>) -> Result<Vec<AnalysisResult>> {
        let inner = self.inner.read();
        let mut matching: Vec<AnalysisResult> = inner
            .results
            .iter()
            .filter(|r| r.url == url && before.map_or(true, |cutoff| r.scanned_at < cutoff))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (b.scanned_at, b.attempt).cmp(&(a.scanned_at, a.attempt)));
        Ok(matching)
    }

    fn list_by_scope(&self, scope: &Scope) -> Result<Vec<AnalysisResult>> {
        let inner = self.inner.read();
        let mut matching: Vec<AnalysisResult> = inner
            .results
            .iter()
            .filter(|r| scope.matches(r.requester_ref.as_deref()))
            .cloned()
            .collect();
        matching.sort_by(|a, b| (a.scanned_at, a.attempt).cmp(&(b.scanned_at, b.attempt)));
        Ok(matching)
    }

    fn save_request(&self, request: &AnalysisRequest) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .requests
            .entry(request.id)
            .and_modify(|existing| existing.status = request.status)
            .or_insert_with(|| request.clone());
        Ok(())
    }

    fn get_request(&self, request_id: Uuid) -> Result<Option<AnalysisRequest>> {
        Ok(self.inner.read().requests.get(&request_id).cloned())
    }

    fn update_request_status(&self, request_id: Uuid, status: JobState) -> Result<()> {
        if let Some(request) = self.inner.write().requests.get_mut(&request_id) {
            request.status = status;
        }
        Ok(())
    }

    fn list_requests(&self, scope: &Scope, limit: Option<usize>) -> Result<Vec<AnalysisRequest>> {
        let inner = self.inner.read();
        let mut matching: Vec<AnalysisRequest> = inner
            .requests
            .values()
            .filter(|r| scope.matches(r.requester_ref.as_deref()))
            .cloned()
            .collect();
        Ok(Self::newest_first(&mut matching, limit))
    }

    fn list_public_requests(&self, limit: Option<usize>) -> Result<Vec<AnalysisRequest>> {
        let inner = self.inner.read();
        let mut matching: Vec<AnalysisRequest> =
            inner.requests.values().filter(|r| r.is_public()).cloned().collect();
        Ok(Self::newest_first(&mut matching, limit))
    }

    fn record_job(&self, job: &ScanJob) -> Result<()> {
        let mut inner = self.inner.write();
        let attempts = inner.jobs.entry(job.request_id).or_default();
        match attempts.iter_mut().find(|j| j.attempt == job.attempt) {
            Some(existing) => *existing = job.clone(),
            None => {
                attempts.push(job.clone());
                attempts.sort_by_key(|j| j.attempt);
            }
        }
        Ok(())
    }

    fn list_jobs(&self, request_id: Uuid) -> Result<Vec<ScanJob>> {
        Ok(self.inner.read().jobs.get(&request_id).cloned().unwrap_or_default())
    }
}
