use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

use super::ResultStore;
use crate::db;
use crate::models::{AnalysisRequest, AnalysisResult, JobState, ScanJob, Scope};

/// SQLite-backed store; one connection serialized behind a mutex
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open (creating if necessary) the database inside `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db_path = db::get_db_path(data_dir)?;
        let conn = db::init_db(&db_path)?;
        tracing::debug!(path = %db_path.display(), "opened result store");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::init_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

fn requester_filter(scope: &Scope) -> Option<&str> {
    match scope {
        Scope::User(user) => Some(user.as_str()),
        Scope::Global => None,
    }
}

impl ResultStore for SqliteResultStore {
    fn save(&self, result: &AnalysisResult) -> Result<bool> {
        db::insert_result(&self.conn.lock(), result)
    }

    fn get(&self, request_id: Uuid) -> Result<Option<AnalysisResult>> {
        db::select_result(&self.conn.lock(), &request_id)
    }

    fn get_attempt(&self, request_id: Uuid, attempt: u32) -> Result<Option<AnalysisResult>> {
        db::select_result_attempt(&self.conn.lock(), &request_id, attempt)
    }

    fn list_by_url(&self, url: &str, before: Option<DateTime<Utc>>) -> Result<Vec<AnalysisResult>> {
        db::select_results_by_url(&self.conn.lock(), url, before.as_ref())
    }

    fn list_by_scope(&self, scope: &Scope) -> Result<Vec<AnalysisResult>> {
        db::select_results_by_requester(&self.conn.lock(), requester_filter(scope))
    }

    fn save_request(&self, request: &AnalysisRequest) -> Result<()> {
        db::upsert_request(&self.conn.lock(), request)
    }

    fn get_request(&self, request_id: Uuid) -> Result<Option<AnalysisRequest>> {
        db::select_request(&self.conn.lock(), &request_id)
    }

    fn update_request_status(&self, request_id: Uuid, status: JobState) -> Result<()> {
        if !db::update_request_status(&self.conn.lock(), &request_id, status)? {
            tracing::warn!(%request_id, status = status.as_str(), "status update for unknown request");
        }
        Ok(())
    }

    fn list_requests(&self, scope: &Scope, limit: Option<usize>) -> Result<Vec<AnalysisRequest>> {
        db::select_requests(&self.conn.lock(), requester_filter(scope), limit)
    }

    fn list_public_requests(&self, limit: Option<usize>) -> Result<Vec<AnalysisRequest>> {
        db::select_public_requests(&self.conn.lock(), limit)
    }

    fn record_job(&self, job: &ScanJob) -> Result<()> {
        db::upsert_job(&self.conn.lock(), job)
    }

    fn list_jobs(&self, request_id: Uuid) -> Result<Vec<ScanJob>> {
        db::select_jobs(&self.conn.lock(), &request_id)
    }
}
