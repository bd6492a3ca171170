// a11y-scan data models

pub mod analytics;
pub mod comparison;
pub mod job;
pub mod request;
pub mod result;
pub mod violation;

// Re-exports for convenience
pub use analytics::{AnalyticsSummary, CategoryCount, TrendPoint};
pub use comparison::{ComparisonOutcome, HistoricalComparison, ResultRef};
pub use job::{JobError, JobId, JobState, JobStatus, ScanJob};
pub use request::{AnalysisRequest, ScanSettings, Scope, Viewport, WcagLevel};
pub use result::{AnalysisResult, Findings};
pub use violation::{
    Category, RawViolation, RawViolationSet, Severity, SeverityCounts, StructuredViolation,
};
