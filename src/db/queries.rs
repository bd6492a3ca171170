use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::error::FailureKind;
use crate::models::*;

// Timestamps are stored as fixed-width RFC 3339 text so that lexical order is
// chronological order.

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("invalid timestamp {:?}: {}", raw, e)))
}

fn optional_timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(_) => timestamp_at(row, idx).map(Some),
        None => Ok(None),
    }
}

fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, format!("invalid uuid {:?}: {}", raw, e)))
}

fn wcag_level_at(row: &Row, idx: usize) -> rusqlite::Result<WcagLevel> {
    let raw: String = row.get(idx)?;
    WcagLevel::from_str(&raw).ok_or_else(|| conversion_error(idx, format!("invalid WCAG level {:?}", raw)))
}

fn job_state_at(row: &Row, idx: usize) -> rusqlite::Result<JobState> {
    let raw: String = row.get(idx)?;
    JobState::from_str(&raw).ok_or_else(|| conversion_error(idx, format!("invalid job state {:?}", raw)))
}

fn sql_limit(limit: Option<usize>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded
    limit.map(|l| l as i64).unwrap_or(-1)
}

// ===== ANALYSIS REQUESTS =====

const REQUEST_COLUMNS: &str = "id, url, requester_ref, wcag_level, viewport_width, viewport_height, \
                               timeout_ms, created_at, status";

fn map_request(row: &Row) -> rusqlite::Result<AnalysisRequest> {
    let timeout_ms: Option<i64> = row.get(6)?;
    Ok(AnalysisRequest {
        id: uuid_at(row, 0)?,
        url: row.get(1)?,
        requester_ref: row.get(2)?,
        settings: ScanSettings {
            wcag_level: wcag_level_at(row, 3)?,
            viewport: Viewport {
                width: row.get(4)?,
                height: row.get(5)?,
            },
            timeout_ms: timeout_ms.map(|ms| ms.max(0) as u64),
        },
        created_at: timestamp_at(row, 7)?,
        status: job_state_at(row, 8)?,
    })
}

/// Insert a request, or refresh its status if it is already stored
pub fn upsert_request(conn: &Connection, request: &AnalysisRequest) -> Result<()> {
    conn.execute(
        "INSERT INTO analysis_requests (id, url, requester_ref, wcag_level, viewport_width,
                                        viewport_height, timeout_ms, created_at, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(id) DO UPDATE SET status = excluded.status",
        params![
            request.id.to_string(),
            request.url,
            request.requester_ref,
            request.settings.wcag_level.as_str(),
            request.settings.viewport.width,
            request.settings.viewport.height,
            request.settings.timeout_ms.map(|ms| ms as i64),
            format_timestamp(&request.created_at),
            request.status.as_str(),
        ],
    )
    .context("Failed to insert analysis request")?;

    Ok(())
}

pub fn select_request(conn: &Connection, id: &Uuid) -> Result<Option<AnalysisRequest>> {
    let sql = format!("SELECT {} FROM analysis_requests WHERE id = ?", REQUEST_COLUMNS);
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare select request query")?;

    let request = stmt
        .query_row(params![id.to_string()], map_request)
        .optional()
        .context("Failed to query analysis request")?;

    Ok(request)
}

/// Update the status column; returns false when no such request exists
pub fn update_request_status(conn: &Connection, id: &Uuid, status: JobState) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE analysis_requests SET status = ? WHERE id = ?",
            params![status.as_str(), id.to_string()],
        )
        .context("Failed to update request status")?;

    Ok(changed > 0)
}

/// Requests for one requester (or all requesters when `None`), newest first
pub fn select_requests(
    conn: &Connection,
    requester_ref: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<AnalysisRequest>> {
    let sql = format!(
        "SELECT {} FROM analysis_requests
         WHERE (?1 IS NULL OR requester_ref = ?1)
         ORDER BY created_at DESC LIMIT ?2",
        REQUEST_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare select requests query")?;

    let requests = stmt
        .query_map(params![requester_ref, sql_limit(limit)], map_request)
        .context("Failed to map requests from query")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect requests")?;

    Ok(requests)
}

/// Anonymous requests, newest first
pub fn select_public_requests(conn: &Connection, limit: Option<usize>) -> Result<Vec<AnalysisRequest>> {
    let sql = format!(
        "SELECT {} FROM analysis_requests
         WHERE requester_ref IS NULL
         ORDER BY created_at DESC LIMIT ?1",
        REQUEST_COLUMNS
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("Failed to prepare select public requests query")?;

    let requests = stmt
        .query_map(params![sql_limit(limit)], map_request)
        .context("Failed to map public requests from query")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect public requests")?;

    Ok(requests)
}

// ===== SCAN JOBS =====

fn map_job(row: &Row) -> rusqlite::Result<ScanJob> {
    let error_kind: Option<String> = row.get(5)?;
    let http_status: Option<u16> = row.get(6)?;
    let error_message: Option<String> = row.get(7)?;

    let last_error = match error_kind {
        Some(kind) => {
            let kind = FailureKind::from_parts(&kind, http_status)
                .ok_or_else(|| conversion_error(5, format!("invalid failure kind {:?}", kind)))?;
            Some(JobError {
                kind,
                message: error_message.unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(ScanJob {
        request_id: uuid_at(row, 0)?,
        attempt: row.get(1)?,
        state: job_state_at(row, 2)?,
        started_at: timestamp_at(row, 3)?,
        finished_at: optional_timestamp_at(row, 4)?,
        last_error,
    })
}

/// Record a job attempt, overwriting any earlier snapshot of the same attempt
pub fn upsert_job(conn: &Connection, job: &ScanJob) -> Result<()> {
    let error = job.last_error.as_ref();
    conn.execute(
        "INSERT INTO scan_jobs (request_id, attempt, state, started_at, finished_at,
                                error_kind, http_status, error_message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(request_id, attempt) DO UPDATE SET
             state = excluded.state,
             finished_at = excluded.finished_at,
             error_kind = excluded.error_kind,
             http_status = excluded.http_status,
             error_message = excluded.error_message",
        params![
            job.request_id.to_string(),
            job.attempt,
            job.state.as_str(),
            format_timestamp(&job.started_at),
            job.finished_at.as_ref().map(format_timestamp),
            error.map(|e| e.kind.as_str()),
            error.and_then(|e| e.kind.status_code()),
            error.map(|e| e.message.as_str()),
        ],
    )
    .context("Failed to record scan job")?;

    Ok(())
}

/// Every recorded attempt for a request, oldest first
pub fn select_jobs(conn: &Connection, request_id: &Uuid) -> Result<Vec<ScanJob>> {
    let mut stmt = conn
        .prepare(
            "SELECT request_id, attempt, state, started_at, finished_at, error_kind, http_status, error_message
             FROM scan_jobs WHERE request_id = ? ORDER BY attempt ASC",
        )
        .context("Failed to prepare select jobs query")?;

    let jobs = stmt
        .query_map(params![request_id.to_string()], map_job)
        .context("Failed to map jobs from query")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect jobs")?;

    Ok(jobs)
}

// ===== ANALYSIS RESULTS =====

const RESULT_COLUMNS: &str = "request_id, attempt, url, requester_ref, scanned_at, score, wcag_level, \
                              critical_count, serious_count, moderate_count, minor_count";

fn map_result(row: &Row) -> rusqlite::Result<AnalysisResult> {
    Ok(AnalysisResult {
        request_id: uuid_at(row, 0)?,
        attempt: row.get(1)?,
        url: row.get(2)?,
        requester_ref: row.get(3)?,
        scanned_at: timestamp_at(row, 4)?,
        score: row.get(5)?,
        wcag_level: wcag_level_at(row, 6)?,
        violations_by_severity: SeverityCounts {
            critical: row.get(7)?,
            serious: row.get(8)?,
            moderate: row.get(9)?,
            minor: row.get(10)?,
        },
        violations: Vec::new(),
    })
}

fn map_violation(row: &Row) -> rusqlite::Result<StructuredViolation> {
    let category: String = row.get(1)?;
    let severity: String = row.get(2)?;
    Ok(StructuredViolation {
        rule_id: row.get(0)?,
        category: Category::from_str(&category)
            .ok_or_else(|| conversion_error(1, format!("invalid category {:?}", category)))?,
        severity: Severity::from_str(&severity)
            .ok_or_else(|| conversion_error(2, format!("invalid severity {:?}", severity)))?,
        affected_element_count: row.get(3)?,
        description: row.get(4)?,
        remediation: row.get(5)?,
        help_url: row.get(6)?,
    })
}

/// Insert a result and its violations in one transaction
///
/// Returns false (and writes nothing) when a result for the same
/// `(request_id, attempt)` already exists.
pub fn insert_result(conn: &Connection, result: &AnalysisResult) -> Result<bool> {
    let tx = conn
        .unchecked_transaction()
        .context("Failed to begin result transaction")?;

    let inserted = tx
        .execute(
            "INSERT OR IGNORE INTO analysis_results (request_id, attempt, url, requester_ref, scanned_at,
                                                     score, wcag_level, critical_count, serious_count,
                                                     moderate_count, minor_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.request_id.to_string(),
                result.attempt,
                result.url,
                result.requester_ref,
                format_timestamp(&result.scanned_at),
                result.score,
                result.wcag_level.as_str(),
                result.violations_by_severity.critical,
                result.violations_by_severity.serious,
                result.violations_by_severity.moderate,
                result.violations_by_severity.minor,
            ],
        )
        .context("Failed to insert analysis result")?;

    if inserted == 0 {
        return Ok(false);
    }

    for (position, violation) in result.violations.iter().enumerate() {
        tx.execute(
            "INSERT INTO violations (request_id, attempt, position, rule_id, category, severity,
                                     affected_element_count, description, remediation, help_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                result.request_id.to_string(),
                result.attempt,
                position as i64,
                violation.rule_id,
                violation.category.as_str(),
                violation.severity.as_str(),
                violation.affected_element_count,
                violation.description,
                violation.remediation,
                violation.help_url,
            ],
        )
        .context(format!("Failed to insert violation {}", violation.rule_id))?;
    }

    tx.commit().context("Failed to commit analysis result")?;
    Ok(true)
}

fn select_violations(conn: &Connection, request_id: &Uuid, attempt: u32) -> Result<Vec<StructuredViolation>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT rule_id, category, severity, affected_element_count, description, remediation, help_url
             FROM violations WHERE request_id = ? AND attempt = ? ORDER BY position ASC",
        )
        .context("Failed to prepare select violations query")?;

    let violations = stmt
        .query_map(params![request_id.to_string(), attempt], map_violation)
        .context("Failed to map violations from query")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect violations")?;

    Ok(violations)
}

fn with_violations(conn: &Connection, mut results: Vec<AnalysisResult>) -> Result<Vec<AnalysisResult>> {
    for result in results.iter_mut() {
        result.violations = select_violations(conn, &result.request_id, result.attempt)?;
    }
    Ok(results)
}

fn query_results<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<AnalysisResult>> {
    let mut stmt = conn
        .prepare(sql)
        .context("Failed to prepare select results query")?;

    let results = stmt
        .query_map(params, map_result)
        .context("Failed to map results from query")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to collect results")?;

    with_violations(conn, results)
}

/// Latest attempt's result for a request
pub fn select_result(conn: &Connection, request_id: &Uuid) -> Result<Option<AnalysisResult>> {
    let sql = format!(
        "SELECT {} FROM analysis_results WHERE request_id = ? ORDER BY attempt DESC LIMIT 1",
        RESULT_COLUMNS
    );
    Ok(query_results(conn, &sql, params![request_id.to_string()])?.pop())
}

pub fn select_result_attempt(conn: &Connection, request_id: &Uuid, attempt: u32) -> Result<Option<AnalysisResult>> {
    let sql = format!(
        "SELECT {} FROM analysis_results WHERE request_id = ? AND attempt = ?",
        RESULT_COLUMNS
    );
    Ok(query_results(conn, &sql, params![request_id.to_string(), attempt])?.pop())
}

/// Results for one URL, newest first, optionally only those scanned before `before`
pub fn select_results_by_url(
    conn: &Connection,
    url: &str,
    before: Option<&DateTime<Utc>>,
) -> Result<Vec<AnalysisResult>> {
    let sql = format!(
        "SELECT {} FROM analysis_results
         WHERE url = ?1 AND (?2 IS NULL OR scanned_at < ?2)
         ORDER BY scanned_at DESC, attempt DESC",
        RESULT_COLUMNS
    );
    query_results(conn, &sql, params![url, before.map(format_timestamp)])
}

/// Results for one requester (or everyone when `None`), oldest first
pub fn select_results_by_requester(conn: &Connection, requester_ref: Option<&str>) -> Result<Vec<AnalysisResult>> {
    let sql = format!(
        "SELECT {} FROM analysis_results
         WHERE (?1 IS NULL OR requester_ref = ?1)
         ORDER BY scanned_at ASC, attempt ASC",
        RESULT_COLUMNS
    );
    query_results(conn, &sql, params![requester_ref])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_helpers::TestDbGuard;
    use chrono::Duration;

    fn sample_request(requester: Option<&str>) -> AnalysisRequest {
        AnalysisRequest::new(
            "https://example.com",
            requester.map(str::to_string),
            ScanSettings::default(),
        )
    }

    fn sample_result(request: &AnalysisRequest, attempt: u32, scanned_at: DateTime<Utc>) -> AnalysisResult {
        let violations = vec![
            StructuredViolation {
                rule_id: "image-alt".to_string(),
                category: Category::Other,
                severity: Severity::Critical,
                affected_element_count: 3,
                description: "Images must have alternate text".to_string(),
                remediation: "Add alt text".to_string(),
                help_url: Some("https://dequeuniversity.com/rules/axe/4.8/image-alt".to_string()),
            },
            StructuredViolation {
                rule_id: "region".to_string(),
                category: Category::Structure,
                severity: Severity::Minor,
                affected_element_count: 1,
                description: "Content should be contained by landmarks".to_string(),
                remediation: "Wrap content in landmarks".to_string(),
                help_url: None,
            },
        ];
        AnalysisResult {
            request_id: request.id,
            attempt,
            url: request.url.clone(),
            requester_ref: request.requester_ref.clone(),
            scanned_at,
            score: 89,
            violations_by_severity: SeverityCounts { critical: 1, serious: 0, moderate: 0, minor: 1 },
            violations,
            wcag_level: WcagLevel::AA,
        }
    }

    #[test]
    fn test_request_round_trip() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();

        let mut request = sample_request(Some("user-1"));
        request.settings.timeout_ms = Some(5_000);
        upsert_request(&conn, &request).unwrap();

        let loaded = select_request(&conn, &request.id).unwrap().unwrap();
        assert_eq!(loaded.url, request.url);
        assert_eq!(loaded.requester_ref.as_deref(), Some("user-1"));
        assert_eq!(loaded.settings, request.settings);
        assert_eq!(loaded.status, JobState::Queued);
        assert_eq!(format_timestamp(&loaded.created_at), format_timestamp(&request.created_at));
    }

    #[test]
    fn test_update_request_status() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();

        let request = sample_request(None);
        upsert_request(&conn, &request).unwrap();

        assert!(update_request_status(&conn, &request.id, JobState::Running).unwrap());
        assert_eq!(select_request(&conn, &request.id).unwrap().unwrap().status, JobState::Running);
        assert!(!update_request_status(&conn, &Uuid::new_v4(), JobState::Running).unwrap());
    }

    #[test]
    fn test_select_requests_filters_and_limits() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();

        for i in 0..3 {
            let mut request = sample_request(Some("user-1"));
            request.created_at = Utc::now() + Duration::seconds(i);
            upsert_request(&conn, &request).unwrap();
        }
        upsert_request(&conn, &sample_request(Some("user-2"))).unwrap();
        upsert_request(&conn, &sample_request(None)).unwrap();

        assert_eq!(select_requests(&conn, Some("user-1"), None).unwrap().len(), 3);
        assert_eq!(select_requests(&conn, Some("user-1"), Some(2)).unwrap().len(), 2);
        assert_eq!(select_requests(&conn, None, None).unwrap().len(), 5);
        assert_eq!(select_public_requests(&conn, None).unwrap().len(), 1);

        let listed = select_requests(&conn, Some("user-1"), None).unwrap();
        assert!(listed[0].created_at >= listed[1].created_at);
    }

    #[test]
    fn test_job_upsert_keeps_one_row_per_attempt() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let request = sample_request(None);

        let mut job = ScanJob::new(request.id, 1, JobState::Running);
        upsert_job(&conn, &job).unwrap();
        job.fail(JobError {
            kind: FailureKind::HttpError { status: 404 },
            message: "HTTP 404".to_string(),
        });
        upsert_job(&conn, &job).unwrap();

        let jobs = select_jobs(&conn, &request.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Failed);
        assert_eq!(
            jobs[0].last_error.as_ref().unwrap().kind,
            FailureKind::HttpError { status: 404 }
        );
        assert!(jobs[0].finished_at.is_some());
    }

    #[test]
    fn test_result_insert_is_idempotent() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let request = sample_request(Some("user-1"));
        let result = sample_result(&request, 1, Utc::now());

        assert!(insert_result(&conn, &result).unwrap());
        assert!(!insert_result(&conn, &result).unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM violations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_result_round_trip_preserves_violation_order() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let request = sample_request(Some("user-1"));
        let result = sample_result(&request, 1, Utc::now());
        insert_result(&conn, &result).unwrap();

        let loaded = select_result(&conn, &request.id).unwrap().unwrap();
        assert_eq!(loaded.violations, result.violations);
        assert_eq!(loaded.violations_by_severity, result.violations_by_severity);
        assert_eq!(loaded.score, 89);
    }

    #[test]
    fn test_select_result_returns_latest_attempt() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let request = sample_request(None);
        let now = Utc::now();

        insert_result(&conn, &sample_result(&request, 1, now)).unwrap();
        insert_result(&conn, &sample_result(&request, 2, now + Duration::seconds(5))).unwrap();

        assert_eq!(select_result(&conn, &request.id).unwrap().unwrap().attempt, 2);
        assert_eq!(select_result_attempt(&conn, &request.id, 1).unwrap().unwrap().attempt, 1);
        assert!(select_result_attempt(&conn, &request.id, 3).unwrap().is_none());
    }

    #[test]
    fn test_results_by_url_newest_first_with_cutoff() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let now = Utc::now();

        let mut ids = Vec::new();
        for i in 0..3 {
            let request = sample_request(None);
            insert_result(&conn, &sample_result(&request, 1, now + Duration::seconds(i))).unwrap();
            ids.push(request.id);
        }

        let all = select_results_by_url(&conn, "https://example.com", None).unwrap();
        assert_eq!(all.iter().map(|r| r.request_id).collect::<Vec<_>>(), vec![ids[2], ids[1], ids[0]]);

        let cutoff = now + Duration::seconds(2);
        let before = select_results_by_url(&conn, "https://example.com", Some(&cutoff)).unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].request_id, ids[1]);

        assert!(select_results_by_url(&conn, "https://other.example", None).unwrap().is_empty());
    }

    #[test]
    fn test_results_by_requester() {
        let guard = TestDbGuard::new();
        let conn = guard.init_db().unwrap();
        let now = Utc::now();

        insert_result(&conn, &sample_result(&sample_request(Some("a")), 1, now)).unwrap();
        insert_result(&conn, &sample_result(&sample_request(Some("b")), 1, now)).unwrap();
        insert_result(&conn, &sample_result(&sample_request(None), 1, now)).unwrap();

        assert_eq!(select_results_by_requester(&conn, Some("a")).unwrap().len(), 1);
        assert_eq!(select_results_by_requester(&conn, None).unwrap().len(), 3);
    }
}
