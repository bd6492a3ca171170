//! Common test helpers for integration tests
//!
//! Provides a scripted page auditor, raw violation builders and an isolated
//! SQLite-backed `AppState` living in a temporary directory.

#![allow(dead_code)]

use a11y_scan::auditor::{AuditOptions, PageAuditor};
use a11y_scan::commands::AppState;
use a11y_scan::error::{AuditFailure, FailureKind};
use a11y_scan::models::{JobState, RawViolation, RawViolationSet, ScanJob};
use a11y_scan::{ScanConfig, Scheduler, SqliteResultStore};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;
use uuid::Uuid;

pub const POLL: Duration = Duration::from_millis(10);

/// One scripted auditor answer
#[derive(Clone)]
pub struct Step {
    pub delay: Duration,
    pub outcome: Result<RawViolationSet, AuditFailure>,
}

impl Step {
    pub fn ok(violations: RawViolationSet) -> Self {
        Self {
            delay: Duration::from_millis(10),
            outcome: Ok(violations),
        }
    }

    pub fn fail(kind: FailureKind, message: &str) -> Self {
        Self {
            delay: Duration::from_millis(10),
            outcome: Err(AuditFailure::new(kind, message)),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Page auditor replaying queued answers per URL
///
/// URLs without a queued answer get `fallback`.
pub struct ScriptedAuditor {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Step,
    calls: AtomicUsize,
}

impl ScriptedAuditor {
    pub fn new(fallback: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Queue an answer for `url`, in any spelling the scheduler would accept
    pub fn push(&self, url: &str, step: Step) {
        self.scripts
            .lock()
            .entry(canonical(url))
            .or_default()
            .push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageAuditor for ScriptedAuditor {
    async fn audit(&self, url: &str, _options: &AuditOptions) -> Result<RawViolationSet, AuditFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .scripts
            .lock()
            .get_mut(&canonical(url))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());
        tokio::time::sleep(step.delay).await;
        step.outcome
    }
}

/// Isolated engine over a temporary SQLite store
pub struct TestEnv {
    temp_dir: TempDir,
    pub auditor: Arc<ScriptedAuditor>,
    pub state: AppState,
}

impl TestEnv {
    pub fn new() -> Result<Self> {
        Self::with_config(Step::ok(critical_and_minor()), |_| {})
    }

    pub fn with_config(fallback: Step, configure: impl FnOnce(&mut ScanConfig)) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let auditor = Arc::new(ScriptedAuditor::new(fallback));
        let mut config = ScanConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..ScanConfig::default()
        };
        configure(&mut config);
        let state = build_state(config, Arc::clone(&auditor))?;
        Ok(Self {
            temp_dir,
            auditor,
            state,
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A second engine over the same database, as after a process restart
    pub fn restart(&self) -> Result<AppState> {
        let config = ScanConfig {
            data_dir: self.temp_dir.path().to_path_buf(),
            ..ScanConfig::default()
        };
        build_state(config, Arc::clone(&self.auditor))
    }

    pub async fn wait(&self, request_id: Uuid) -> ScanJob {
        self.state
            .scheduler
            .wait_for_terminal(request_id, POLL)
            .await
            .unwrap_or_else(|e| panic!("waiting for {} failed: {}", request_id, e))
    }
}

fn canonical(url: &str) -> String {
    Url::parse(url.trim())
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| url.to_string())
}

fn build_state(config: ScanConfig, auditor: Arc<ScriptedAuditor>) -> Result<AppState> {
    let store = Arc::new(SqliteResultStore::open(&config.data_dir)?);
    Ok(AppState::new(Scheduler::new(config, auditor, store)))
}

pub fn raw(rule_id: &str, impact: &str, nodes: u32) -> RawViolation {
    RawViolation {
        description: format!("{} violation", rule_id),
        selector: format!("#{}", rule_id),
        help_url: Some(format!("https://dequeuniversity.com/rules/axe/4.8/{}", rule_id)),
        ..RawViolation::new(rule_id, impact, nodes)
    }
}

/// Critical color contrast on four nodes plus a minor region issue: score 89
pub fn critical_and_minor() -> RawViolationSet {
    vec![raw("color-contrast", "critical", 4), raw("region", "minor", 2)]
}

pub fn assert_state(job: &ScanJob, expected: JobState) {
    assert_eq!(
        job.state, expected,
        "attempt {} of {} ended {:?} ({:?})",
        job.attempt, job.request_id, job.state, job.last_error
    );
}
