use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::result::AnalysisResult;

/// Lightweight pointer to a stored result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResultRef {
    pub request_id: Uuid,
    pub attempt: u32,
    pub scanned_at: DateTime<Utc>,
    pub score: u32,
}

impl From<&AnalysisResult> for ResultRef {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            request_id: result.request_id,
            attempt: result.attempt,
            scanned_at: result.scanned_at,
            score: result.score,
        }
    }
}

/// Trend between a baseline result and the current one for the same URL
///
/// Rule id lists are sorted and `new_violations` never overlaps
/// `resolved_violations`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalComparison {
    pub url: String,
    pub baseline: ResultRef,
    pub current: ResultRef,
    pub new_violations: Vec<String>,
    pub resolved_violations: Vec<String>,
    pub regressed_rule_ids: Vec<String>,
    pub score_delta: i64,
}

/// Outcome of a comparison request; a first scan has no baseline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ComparisonOutcome {
    NoBaseline,
    Compared(HistoricalComparison),
}

impl ComparisonOutcome {
    pub fn comparison(&self) -> Option<&HistoricalComparison> {
        match self {
            ComparisonOutcome::Compared(c) => Some(c),
            ComparisonOutcome::NoBaseline => None,
        }
    }
}
