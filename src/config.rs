//! Runtime configuration
//!
//! Read once at startup from the process environment (after `.env` has been
//! loaded) and handed to the scheduler and store explicitly.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::env::{env_string, env_u64};

pub const DEFAULT_MAX_CONCURRENT_AUDITS: usize = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TIMEOUT_GRACE_MS: u64 = 1_000;
pub const DEFAULT_AUDITOR_URL: &str = "http://127.0.0.1:4000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Upper bound on audits running at the same time
    pub max_concurrent_audits: usize,
    /// Audit timeout for requests that do not set one
    pub default_timeout_ms: u64,
    /// Slack granted to the auditor transport beyond the audit timeout
    pub timeout_grace_ms: u64,
    pub auditor_url: String,
    pub data_dir: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_concurrent_audits: DEFAULT_MAX_CONCURRENT_AUDITS,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            timeout_grace_ms: DEFAULT_TIMEOUT_GRACE_MS,
            auditor_url: DEFAULT_AUDITOR_URL.to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl ScanConfig {
    /// Build configuration from `A11Y_*` environment variables
    ///
    /// # Errors
    /// Returns error if a numeric variable is malformed or out of range
    pub fn from_env() -> Result<Self> {
        let max_concurrent_audits =
            env_u64("A11Y_MAX_CONCURRENT_AUDITS", DEFAULT_MAX_CONCURRENT_AUDITS as u64)?;
        let default_timeout_ms = env_u64("A11Y_DEFAULT_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let timeout_grace_ms = env_u64("A11Y_TIMEOUT_GRACE_MS", DEFAULT_TIMEOUT_GRACE_MS)?;

        let config = Self {
            max_concurrent_audits: usize::try_from(max_concurrent_audits)
                .map_err(|_| anyhow!("A11Y_MAX_CONCURRENT_AUDITS is out of range"))?,
            default_timeout_ms,
            timeout_grace_ms,
            auditor_url: env_string("A11Y_AUDITOR_URL").unwrap_or_else(|| DEFAULT_AUDITOR_URL.to_string()),
            data_dir: env_string("A11Y_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_audits == 0 {
            return Err(anyhow!("A11Y_MAX_CONCURRENT_AUDITS must be at least 1"));
        }
        if self.default_timeout_ms == 0 {
            return Err(anyhow!("A11Y_DEFAULT_TIMEOUT_MS must be at least 1"));
        }
        Ok(())
    }

    pub fn timeout_grace(&self) -> Duration {
        Duration::from_millis(self.timeout_grace_ms)
    }

    /// Effective audit timeout for a request's optional setting
    pub fn effective_timeout_ms(&self, requested: Option<u64>) -> u64 {
        requested.filter(|ms| *ms > 0).unwrap_or(self.default_timeout_ms)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("a11y-scan"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}
