use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::Scope;
use super::violation::{Category, SeverityCounts};

/// One point on the score trend line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub score: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: Category,
    pub occurrences: u32,
}

/// Rolled-up statistics over a scope's scan history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub scope: Scope,
    pub total_scans: u32,
    /// `None` when there is nothing to average
    pub average_score: Option<f64>,
    pub distinct_urls: u32,
    pub violations_by_severity: SeverityCounts,
    /// Most frequent first
    pub most_common_violation_categories: Vec<CategoryCount>,
    /// Chronological, one point per completed scan
    pub score_trend_over_time: Vec<TrendPoint>,
}
