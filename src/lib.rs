// a11y-scan - WCAG scan orchestration and analysis engine
// Module re-exports

pub mod analytics;
pub mod analyzer;
pub mod auditor;
pub mod commands;
pub mod comparator;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod security;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use models::{
    AnalysisRequest, AnalysisResult, AnalyticsSummary, Category, ComparisonOutcome, HistoricalComparison, JobId,
    JobState, RawViolation, ScanJob, ScanSettings, Scope, Severity, StructuredViolation, WcagLevel,
};

pub use analytics::TimeRange;
pub use auditor::{HttpPageAuditor, PageAuditor};
pub use commands::AppState;
pub use config::ScanConfig;
pub use error::{AuditFailure, FailureKind, ScanError};
pub use scheduler::Scheduler;
pub use store::{MemoryResultStore, ResultStore, SqliteResultStore};
