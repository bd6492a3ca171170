//! Environment variable management
//!
//! Loads an optional `.env` file and parses typed settings from the process
//! environment.

use anyhow::{anyhow, Result};
use std::env;

/// Load environment variables from .env file
///
/// Does not fail if .env file doesn't exist (optional configuration).
pub fn load_env() -> Result<()> {
    match dotenv::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable .env file"),
    }
    Ok(())
}

/// Read a non-empty string variable, `None` when unset or blank
pub fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read an unsigned integer variable, falling back to `default` when unset
///
/// # Errors
/// Returns error if the variable is set but is not a non-negative integer
pub fn env_u64(name: &str, default: u64) -> Result<u64> {
    match env_string(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| anyhow!("{} must be a non-negative integer, got {:?}", name, raw)),
    }
}
