//! Test isolation and database setup helpers
//!
//! Each guard owns a private temporary directory, so tests never share a
//! database file or depend on process environment.

use rusqlite::Connection;
use std::path::PathBuf;

pub struct TestDbGuard {
    pub temp_dir: tempfile::TempDir,
}

impl TestDbGuard {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().unwrap();
        TestDbGuard { temp_dir }
    }

    pub fn db_path(&self) -> PathBuf {
        self.temp_dir.path().join(super::DB_FILE_NAME)
    }

    /// Open a fresh, migrated database inside the guard's directory
    pub fn init_db(&self) -> anyhow::Result<Connection> {
        super::init_db(&self.db_path())
    }
}

impl Default for TestDbGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_isolation() {
        let guard1 = TestDbGuard::new();
        let conn1 = guard1.init_db().expect("Failed to initialize database");
        conn1
            .execute(
                "UPDATE analysis_requests SET status = 'Failed' WHERE id = 'missing'",
                [],
            )
            .unwrap();

        let guard2 = TestDbGuard::new();
        assert_ne!(guard1.db_path(), guard2.db_path());

        let conn2 = guard2.init_db().expect("Failed to initialize database");
        let count: i64 = conn2
            .query_row("SELECT COUNT(*) FROM analysis_requests", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
