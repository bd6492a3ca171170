use anyhow::{Context, Result};
use rusqlite::Connection;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS analysis_requests (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    requester_ref TEXT,
    wcag_level TEXT NOT NULL CHECK(wcag_level IN ('A', 'AA', 'AAA')),
    viewport_width INTEGER NOT NULL,
    viewport_height INTEGER NOT NULL,
    timeout_ms INTEGER,
    created_at TEXT NOT NULL,
    status TEXT NOT NULL
        CHECK(status IN ('Queued', 'Running', 'Completed', 'Failed', 'Cancelled'))
);

CREATE TABLE IF NOT EXISTS scan_jobs (
    request_id TEXT NOT NULL,
    attempt INTEGER NOT NULL CHECK(attempt >= 1),
    state TEXT NOT NULL
        CHECK(state IN ('Queued', 'Running', 'Completed', 'Failed', 'Cancelled')),
    started_at TEXT NOT NULL,
    finished_at TEXT,
    error_kind TEXT,
    http_status INTEGER,
    error_message TEXT,
    PRIMARY KEY (request_id, attempt)
);

CREATE TABLE IF NOT EXISTS analysis_results (
    request_id TEXT NOT NULL,
    attempt INTEGER NOT NULL CHECK(attempt >= 1),
    url TEXT NOT NULL,
    requester_ref TEXT,
    scanned_at TEXT NOT NULL,
    score INTEGER NOT NULL CHECK(score >= 0 AND score <= 100),
    wcag_level TEXT NOT NULL CHECK(wcag_level IN ('A', 'AA', 'AAA')),
    critical_count INTEGER NOT NULL DEFAULT 0,
    serious_count INTEGER NOT NULL DEFAULT 0,
    moderate_count INTEGER NOT NULL DEFAULT 0,
    minor_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (request_id, attempt)
);

CREATE TABLE IF NOT EXISTS violations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL,
    attempt INTEGER NOT NULL,
    position INTEGER NOT NULL,
    rule_id TEXT NOT NULL,
    category TEXT NOT NULL
        CHECK(category IN ('color-contrast', 'keyboard', 'aria', 'forms', 'structure', 'other')),
    severity TEXT NOT NULL CHECK(severity IN ('critical', 'serious', 'moderate', 'minor')),
    affected_element_count INTEGER NOT NULL,
    description TEXT NOT NULL,
    remediation TEXT NOT NULL,
    help_url TEXT,
    FOREIGN KEY (request_id, attempt)
        REFERENCES analysis_results(request_id, attempt) ON DELETE CASCADE
);
";

/// Index creation statements, safe to run on every init
const INDEX_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_requests_requester ON analysis_requests(requester_ref, created_at);
CREATE INDEX IF NOT EXISTS idx_requests_created_at ON analysis_requests(created_at);
CREATE INDEX IF NOT EXISTS idx_results_url_scanned_at ON analysis_results(url, scanned_at);
CREATE INDEX IF NOT EXISTS idx_results_requester ON analysis_results(requester_ref);
CREATE INDEX IF NOT EXISTS idx_violations_result ON violations(request_id, attempt);
";

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Get current database schema version
fn get_schema_version(conn: &Connection) -> Result<i64> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("Failed to get schema version")?;
    Ok(version)
}

/// Set database schema version
fn set_schema_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute(&format!("PRAGMA user_version = {}", version), [])
        .context("Failed to set schema version")?;
    Ok(())
}

/// Migrate from v0 (empty) to v1 (initial schema)
fn migrate_to_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .context("Failed to execute v1 schema migration")?;
    Ok(())
}

/// Run all pending migrations
///
/// Safe to call on every startup.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version = get_schema_version(conn)?;

    if version < 1 {
        migrate_to_v1(conn)?;
        set_schema_version(conn, 1)?;
    }

    conn.execute_batch(INDEX_SQL)
        .context("Failed to create indexes")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_create_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"analysis_requests".to_string()));
        assert!(tables.contains(&"scan_jobs".to_string()));
        assert!(tables.contains(&"analysis_results".to_string()));
        assert!(tables.contains(&"violations".to_string()));
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn test_score_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let result = conn.execute(
            "INSERT INTO analysis_results (request_id, attempt, url, scanned_at, score, wcag_level)
             VALUES ('r', 1, 'https://example.com', '2024-01-01T00:00:00.000000Z', 101, 'AA')",
            [],
        );
        assert!(result.is_err());
    }
}
