//! History commands
//!
//! Per-URL history, historical comparison and per-result breakdowns

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::AppState;
use crate::comparator;
use crate::error::ScanError;
use crate::models::{
    AnalysisResult, Category, ComparisonOutcome, Severity, SeverityCounts, StructuredViolation, WcagLevel,
};
use crate::security::validate_target_url;

/// How many rules `most_affected` lists
pub const MOST_AFFECTED_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub category: Category,
    pub rule_count: u32,
    pub affected_elements: u32,
    pub worst_severity: Severity,
}

/// Breakdown of one result's violations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViolationAnalysis {
    pub request_id: Uuid,
    pub attempt: u32,
    pub url: String,
    pub score: u32,
    pub wcag_level: WcagLevel,
    pub total_violations: u32,
    pub total_affected_elements: u32,
    pub by_severity: SeverityCounts,
    /// Most affected elements first
    pub by_category: Vec<CategoryBreakdown>,
    pub most_affected: Vec<StructuredViolation>,
}

impl ViolationAnalysis {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let mut categories: BTreeMap<Category, CategoryBreakdown> = BTreeMap::new();
        for violation in &result.violations {
            categories
                .entry(violation.category)
                .and_modify(|b| {
                    b.rule_count += 1;
                    b.affected_elements += violation.affected_element_count;
                    b.worst_severity = b.worst_severity.max(violation.severity);
                })
                .or_insert(CategoryBreakdown {
                    category: violation.category,
                    rule_count: 1,
                    affected_elements: violation.affected_element_count,
                    worst_severity: violation.severity,
                });
        }
        let mut by_category: Vec<CategoryBreakdown> = categories.into_values().collect();
        by_category.sort_by(|a, b| b.affected_elements.cmp(&a.affected_elements));

        let mut most_affected = result.violations.clone();
        most_affected.sort_by(|a, b| {
            b.affected_element_count
                .cmp(&a.affected_element_count)
                .then_with(|| b.severity.cmp(&a.severity))
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });
        most_affected.truncate(MOST_AFFECTED_LIMIT);

        Self {
            request_id: result.request_id,
            attempt: result.attempt,
            url: result.url.clone(),
            score: result.score,
            wcag_level: result.wcag_level,
            total_violations: result.violations.len() as u32,
            total_affected_elements: result.violations.iter().map(|v| v.affected_element_count).sum(),
            by_severity: result.violations_by_severity,
            by_category,
            most_affected,
        }
    }
}

/// All results for a URL, newest first
pub async fn get_analysis_by_url(state: &AppState, url: &str) -> Result<Vec<AnalysisResult>, ScanError> {
    let url = normalized_url(url)?;
    state.store.list_by_url(&url, None).map_err(ScanError::persistence)
}

/// Compare the newest result for a URL with the scan before it
///
/// Returns: `NoBaseline` when the URL has been scanned only once;
/// `NotFound` when it has never been scanned
pub async fn get_historical_comparison(state: &AppState, url: &str) -> Result<ComparisonOutcome, ScanError> {
    let url = normalized_url(url)?;
    comparator::compare_latest(state.store.as_ref(), &url)
}

/// Compare a request's latest result with the scan of its URL before it
///
/// Pinned to that result, so later scans of the same URL do not shift it.
pub async fn get_result_comparison(state: &AppState, request_id: Uuid) -> Result<ComparisonOutcome, ScanError> {
    let result = super::get_analysis_result(state, request_id).await?;
    comparator::compare(state.store.as_ref(), &result.url, &result)
}

/// Category and severity breakdown of a request's latest result
pub async fn get_violation_analysis(state: &AppState, request_id: Uuid) -> Result<ViolationAnalysis, ScanError> {
    let result = super::get_analysis_result(state, request_id).await?;
    Ok(ViolationAnalysis::from_result(&result))
}

/// Canonical form of `url`, the same one `submit` stores
fn normalized_url(url: &str) -> Result<String, ScanError> {
    let target = validate_target_url(url).map_err(|e| ScanError::InvalidRequest(format!("{:#}", e)))?;
    Ok(target.to_string())
}
