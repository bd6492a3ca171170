//! Analytics aggregator
//!
//! Read-only roll-ups over stored results. An empty scope is a normal
//! answer (zero scans, no average, empty trend), never an error.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::ScanError;
use crate::models::{AnalysisResult, AnalyticsSummary, Category, CategoryCount, Scope, SeverityCounts, TrendPoint};
use crate::store::ResultStore;

/// Time range for analytics queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRange::TwentyFourHours => "24h",
            TimeRange::SevenDays => "7d",
            TimeRange::ThirtyDays => "30d",
            TimeRange::All => "all",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "24h" => Some(TimeRange::TwentyFourHours),
            "7d" => Some(TimeRange::SevenDays),
            "30d" => Some(TimeRange::ThirtyDays),
            "all" => Some(TimeRange::All),
            _ => None,
        }
    }

    /// Start of the window ending at `now`; `None` for "all"
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::TwentyFourHours => Some(now - Duration::hours(24)),
            TimeRange::SevenDays => Some(now - Duration::days(7)),
            TimeRange::ThirtyDays => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

/// Summarize every stored result in `scope`
pub fn summarize(store: &dyn ResultStore, scope: &Scope) -> Result<AnalyticsSummary, ScanError> {
    summarize_since(store, scope, None)
}

/// Summarize results in `scope` scanned at or after `since`
pub fn summarize_since(
    store: &dyn ResultStore,
    scope: &Scope,
    since: Option<DateTime<Utc>>,
) -> Result<AnalyticsSummary, ScanError> {
    let results = store.list_by_scope(scope).map_err(ScanError::persistence)?;
    let in_window: Vec<AnalysisResult> = results
        .into_iter()
        .filter(|r| since.map_or(true, |start| r.scanned_at >= start))
        .collect();
    Ok(aggregate(scope.clone(), &in_window))
}

/// Fold a set of results into a summary
pub fn aggregate(scope: Scope, results: &[AnalysisResult]) -> AnalyticsSummary {
    let mut ordered: Vec<&AnalysisResult> = results.iter().collect();
    ordered.sort_by(|a, b| (a.scanned_at, a.attempt).cmp(&(b.scanned_at, b.attempt)));

    let mut severity = SeverityCounts::default();
    let mut categories: BTreeMap<Category, u32> = BTreeMap::new();
    let mut urls: BTreeSet<&str> = BTreeSet::new();
    let mut score_total: u64 = 0;

    for result in &ordered {
        severity.add(&result.violations_by_severity);
        for violation in &result.violations {
            *categories.entry(violation.category).or_insert(0) += 1;
        }
        urls.insert(result.url.as_str());
        score_total += u64::from(result.score);
    }

    let total_scans = ordered.len() as u32;
    let average_score = if ordered.is_empty() {
        None
    } else {
        Some(score_total as f64 / ordered.len() as f64)
    };

    let mut most_common: Vec<CategoryCount> = categories
        .into_iter()
        .map(|(category, occurrences)| CategoryCount { category, occurrences })
        .collect();
    // Stable sort keeps category order among ties
    most_common.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));

    let score_trend_over_time = ordered
        .iter()
        .map(|r| TrendPoint {
            timestamp: r.scanned_at,
            score: r.score,
            url: r.url.clone(),
        })
        .collect();

    AnalyticsSummary {
        scope,
        total_scans,
        average_score,
        distinct_urls: urls.len() as u32,
        violations_by_severity: severity,
        most_common_violation_categories: most_common,
        score_trend_over_time,
    }
}
