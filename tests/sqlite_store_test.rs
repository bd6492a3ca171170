//! SQLite result store tests
//!
//! Exercise the store through its trait on a real database file: schema
//! setup, idempotent saves, ordering and scope filtering, reopening.

mod common;

use a11y_scan::analyzer::analyze;
use a11y_scan::db;
use a11y_scan::models::{AnalysisRequest, AnalysisResult, JobState, ScanJob, ScanSettings, Scope, WcagLevel};
use a11y_scan::{ResultStore, SqliteResultStore};
use chrono::{Duration, Utc};
use common::{critical_and_minor, raw};
use rusqlite::Connection;
use tempfile::TempDir;

fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count == 1)
    .unwrap_or(false)
}

fn completed(request: &AnalysisRequest, attempt: u32, minutes_ago: i64) -> AnalysisResult {
    let findings = analyze(&critical_and_minor(), request.settings.wcag_level);
    AnalysisResult::from_findings(request, attempt, Utc::now() - Duration::minutes(minutes_ago), findings)
}

#[test]
fn test_database_is_initialized_on_open() {
    let temp = TempDir::new().unwrap();
    let _store = SqliteResultStore::open(temp.path()).unwrap();

    let conn = db::init_db(&temp.path().join(db::DB_FILE_NAME)).unwrap();
    for table in ["analysis_requests", "scan_jobs", "analysis_results", "violations"] {
        assert!(table_exists(&conn, table), "missing table {}", table);
    }
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
    assert_eq!(version, db::migrations::CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_round_trip_and_idempotent_save() {
    let temp = TempDir::new().unwrap();
    let store = SqliteResultStore::open(temp.path()).unwrap();

    let request = AnalysisRequest::new("https://example.com", Some("u1".to_string()), ScanSettings::default());
    store.save_request(&request).unwrap();
    let result = completed(&request, 1, 0);

    assert!(store.save(&result).unwrap());
    assert!(!store.save(&result).unwrap());

    let loaded = store.get(request.id).unwrap().unwrap();
    assert_eq!(loaded.score, 89);
    assert_eq!(loaded.violations.len(), 2);
    assert_eq!(loaded.violations[0].rule_id, "color-contrast");
    assert_eq!(loaded.violations[0].help_url, result.violations[0].help_url);
    assert_eq!(loaded.wcag_level, WcagLevel::AA);
    assert_eq!(store.list_by_url("https://example.com", None).unwrap().len(), 1);
}

#[test]
fn test_url_history_ordering_and_cutoff() {
    let temp = TempDir::new().unwrap();
    let store = SqliteResultStore::open(temp.path()).unwrap();
    let request = AnalysisRequest::new("https://example.com", None, ScanSettings::default());
    store.save_request(&request).unwrap();

    let oldest = completed(&request, 1, 30);
    let middle = completed(&request, 2, 20);
    let newest = completed(&request, 3, 10);
    for result in [&middle, &newest, &oldest] {
        store.save(result).unwrap();
    }

    let attempts: Vec<u32> = store
        .list_by_url("https://example.com", None)
        .unwrap()
        .iter()
        .map(|r| r.attempt)
        .collect();
    assert_eq!(attempts, vec![3, 2, 1]);

    let before_newest = store
        .list_by_url("https://example.com", Some(newest.scanned_at - Duration::seconds(1)))
        .unwrap();
    assert_eq!(before_newest.first().map(|r| r.attempt), Some(2));

    assert_eq!(store.get(request.id).unwrap().unwrap().attempt, 3);
    assert_eq!(store.get_attempt(request.id, 1).unwrap().unwrap().scanned_at, oldest.scanned_at);
}

#[test]
fn test_scope_filtering_and_job_history() {
    let temp = TempDir::new().unwrap();
    let store = SqliteResultStore::open(temp.path()).unwrap();

    let mine = AnalysisRequest::new("https://a.example.com", Some("u1".to_string()), ScanSettings::default());
    let anonymous = AnalysisRequest::new("https://b.example.com", None, ScanSettings::default());
    for request in [&mine, &anonymous] {
        store.save_request(request).unwrap();
        store.save(&completed(request, 1, 5)).unwrap();
    }

    assert_eq!(store.list_by_scope(&Scope::user("u1")).unwrap().len(), 1);
    assert_eq!(store.list_by_scope(&Scope::Global).unwrap().len(), 2);
    assert_eq!(store.list_public_requests(None).unwrap()[0].id, anonymous.id);

    let mut job = ScanJob::new(mine.id, 1, JobState::Running);
    store.record_job(&job).unwrap();
    job.transition(JobState::Completed);
    store.record_job(&job).unwrap();
    store.update_request_status(mine.id, JobState::Completed).unwrap();

    let jobs = store.list_jobs(mine.id).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Completed);
    assert_eq!(store.get_request(mine.id).unwrap().unwrap().status, JobState::Completed);
}

#[test]
fn test_data_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let request = AnalysisRequest::new("https://example.com", None, ScanSettings::default());
    {
        let store = SqliteResultStore::open(temp.path()).unwrap();
        store.save_request(&request).unwrap();
        let findings = analyze(&[raw("image-alt", "serious", 3)], WcagLevel::A);
        store
            .save(&AnalysisResult::from_findings(&request, 1, Utc::now(), findings))
            .unwrap();
    }

    let reopened = SqliteResultStore::open(temp.path()).unwrap();
    let result = reopened.get(request.id).unwrap().unwrap();
    assert_eq!(result.score, 95);
    assert_eq!(result.wcag_level, WcagLevel::A);
}
