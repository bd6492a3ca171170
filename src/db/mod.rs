use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub mod migrations;
pub mod queries;

#[cfg(test)]
pub mod test_helpers;

pub use migrations::run_migrations;
pub use queries::*;

pub const DB_FILE_NAME: &str = "a11y-scan.db";

/// Resolve the database file inside `data_dir`, creating the directory if needed
pub fn get_db_path(data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)
        .context(format!("Failed to create data directory: {:?}", data_dir))?;

    Ok(data_dir.join(DB_FILE_NAME))
}

/// Open the database at `db_path` and run migrations
pub fn init_db(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
            | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
            | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .context(format!("Failed to open database at {:?}", db_path))?;

    configure(&conn)?;

    // journal_mode answers with the resulting mode, so it has to go through query_row
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .context("Failed to enable WAL mode")?;

    run_migrations(&conn)?;

    Ok(conn)
}

/// Fresh migrated in-memory database
pub fn init_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
    configure(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    conn.busy_timeout(std::time::Duration::from_secs(5))
        .context("Failed to set busy timeout")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_db_path_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("nested").join("data");

        let path = get_db_path(&nested).unwrap();
        assert!(path.to_string_lossy().ends_with(DB_FILE_NAME));
        assert!(nested.exists());
    }

    #[test]
    fn test_init_db_creates_schema() {
        let temp_dir = TempDir::new().unwrap();
        let path = get_db_path(temp_dir.path()).unwrap();

        let conn = init_db(&path).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='analysis_results'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = init_in_memory().unwrap();

        let foreign_keys_enabled: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert!(foreign_keys_enabled);
    }

    #[test]
    fn test_init_db_reopens_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = get_db_path(temp_dir.path()).unwrap();

        drop(init_db(&path).unwrap());
        let conn = init_db(&path).unwrap();
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
        assert_eq!(version, migrations::CURRENT_SCHEMA_VERSION);
    }
}
