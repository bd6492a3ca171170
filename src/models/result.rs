use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::{AnalysisRequest, WcagLevel};
use super::violation::{SeverityCounts, StructuredViolation};

/// Output of the violation analyzer, independent of when or for whom it ran
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Findings {
    pub score: u32,
    pub violations_by_severity: SeverityCounts,
    pub violations: Vec<StructuredViolation>,
    pub wcag_level: WcagLevel,
}

/// Persisted outcome of one completed scan attempt
///
/// Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub request_id: Uuid,
    pub attempt: u32,
    pub url: String,
    pub requester_ref: Option<String>,
    pub scanned_at: DateTime<Utc>,
    /// Compliance score, 0 to 100
    pub score: u32,
    pub violations_by_severity: SeverityCounts,
    pub violations: Vec<StructuredViolation>,
    pub wcag_level: WcagLevel,
}

impl AnalysisResult {
    pub fn from_findings(
        request: &AnalysisRequest,
        attempt: u32,
        scanned_at: DateTime<Utc>,
        findings: Findings,
    ) -> Self {
        Self {
            request_id: request.id,
            attempt,
            url: request.url.clone(),
            requester_ref: request.requester_ref.clone(),
            scanned_at,
            score: findings.score,
            violations_by_severity: findings.violations_by_severity,
            violations: findings.violations,
            wcag_level: findings.wcag_level,
        }
    }

    pub fn violation(&self, rule_id: &str) -> Option<&StructuredViolation> {
        self.violations.iter().find(|v| v.rule_id == rule_id)
    }
}
