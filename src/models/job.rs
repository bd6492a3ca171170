use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AuditFailure, FailureKind};

/// Lifecycle state of a scan job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
            JobState::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Queued" => Some(JobState::Queued),
            "Running" => Some(JobState::Running),
            "Completed" => Some(JobState::Completed),
            "Failed" => Some(JobState::Failed),
            "Cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Running)
    }

    /// Forward-only transition table
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Running)
                | (JobState::Queued, JobState::Cancelled)
                | (JobState::Running, JobState::Completed)
                | (JobState::Running, JobState::Failed)
                | (JobState::Running, JobState::Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one attempt of one analysis request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct JobId {
    pub request_id: Uuid,
    pub attempt: u32,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.request_id, self.attempt)
    }
}

/// Classified failure recorded on a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobError {
    pub kind: FailureKind,
    pub message: String,
}

impl From<AuditFailure> for JobError {
    fn from(failure: AuditFailure) -> Self {
        Self {
            kind: failure.kind,
            message: failure.message,
        }
    }
}

/// One execution attempt of an accessibility audit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanJob {
    pub request_id: Uuid,
    pub state: JobState,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<JobError>,
}

impl ScanJob {
    pub fn new(request_id: Uuid, attempt: u32, state: JobState) -> Self {
        Self {
            request_id,
            state,
            attempt,
            started_at: Utc::now(),
            finished_at: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> JobId {
        JobId {
            request_id: self.request_id,
            attempt: self.attempt,
        }
    }

    /// Apply a forward transition, returning false when the table forbids it
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    pub fn fail(&mut self, error: JobError) -> bool {
        if !self.transition(JobState::Failed) {
            return false;
        }
        self.last_error = Some(error);
        true
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            state: self.state,
            attempt: self.attempt,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error_kind: self.last_error.as_ref().map(|e| e.kind.as_str().to_string()),
            http_status: self.last_error.as_ref().and_then(|e| e.kind.status_code()),
            error_message: self.last_error.as_ref().map(|e| e.message.clone()),
            retriable: self.last_error.as_ref().map(|e| e.kind.is_retriable()),
        }
    }
}

/// Externally observable status of the current attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retriable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_state_round_trip_names() {
        for state in [
            JobState::Queued,
            JobState::Running,
            JobState::Completed,
            JobState::Failed,
            JobState::Cancelled,
        ] {
            assert_eq!(JobState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(JobState::from_str("processing"), None);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [JobState::Completed, JobState::Failed, JobState::Cancelled] {
            for next in [
                JobState::Queued,
                JobState::Running,
                JobState::Completed,
                JobState::Failed,
                JobState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_cancel_never_moves_back_to_queued() {
        assert!(!JobState::Running.can_transition_to(JobState::Queued));
        assert!(JobState::Queued.can_transition_to(JobState::Cancelled));
        assert!(JobState::Running.can_transition_to(JobState::Cancelled));
    }

    #[test]
    fn test_queued_cannot_complete_without_running() {
        assert!(!JobState::Queued.can_transition_to(JobState::Completed));
        assert!(!JobState::Queued.can_transition_to(JobState::Failed));
    }

    #[test]
    fn test_scan_job_transitions_set_finished_at() {
        let mut job = ScanJob::new(Uuid::new_v4(), 1, JobState::Queued);
        assert!(job.transition(JobState::Running));
        assert!(job.finished_at.is_none());
        assert!(job.transition(JobState::Completed));
        assert!(job.finished_at.is_some());
        assert!(!job.transition(JobState::Failed));
        assert_eq!(job.state, JobState::Completed);
    }

    #[test]
    fn test_failed_status_exposes_classification() {
        let mut job = ScanJob::new(Uuid::new_v4(), 2, JobState::Running);
        assert!(job.fail(JobError {
            kind: FailureKind::HttpError { status: 503 },
            message: "HTTP 503 Service Unavailable".to_string(),
        }));

        let status = job.status();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.attempt, 2);
        assert_eq!(status.error_kind.as_deref(), Some("HttpError"));
        assert_eq!(status.http_status, Some(503));
        assert_eq!(status.retriable, Some(true));
    }

    #[test]
    fn test_job_id_display() {
        let id = Uuid::nil();
        let job_id = JobId { request_id: id, attempt: 3 };
        assert_eq!(job_id.to_string(), format!("{}#3", id));
    }
}
