//! Historical comparator
//!
//! Compares a result with the scan of the same URL that immediately preceded
//! it. Matching is by rule id only; selectors change between renders.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ScanError;
use crate::models::{AnalysisResult, ComparisonOutcome, HistoricalComparison, ResultRef};
use crate::store::ResultStore;

/// Compare `current` with the latest result for `url` scanned strictly before it
///
/// A first scan yields `NoBaseline`; that is an outcome, not an error.
pub fn compare(
    store: &dyn ResultStore,
    url: &str,
    current: &AnalysisResult,
) -> Result<ComparisonOutcome, ScanError> {
    let earlier = store
        .list_by_url(url, Some(current.scanned_at))
        .map_err(ScanError::persistence)?;

    // Stores may round timestamps, so the current result itself can show up here
    let baseline = earlier
        .iter()
        .find(|r| !(r.request_id == current.request_id && r.attempt == current.attempt));

    Ok(match baseline {
        Some(baseline) => ComparisonOutcome::Compared(diff(baseline, current)),
        None => ComparisonOutcome::NoBaseline,
    })
}

/// Compare the newest stored result for `url` with its predecessor
pub fn compare_latest(store: &dyn ResultStore, url: &str) -> Result<ComparisonOutcome, ScanError> {
    let results = store.list_by_url(url, None).map_err(ScanError::persistence)?;
    let current = results
        .first()
        .ok_or_else(|| ScanError::NotFound(format!("no analysis results for {}", url)))?;
    compare(store, url, current)
}

/// Rule-level delta between two results
pub fn diff(baseline: &AnalysisResult, current: &AnalysisResult) -> HistoricalComparison {
    let before: BTreeMap<&str, u32> = element_counts(baseline);
    let after: BTreeMap<&str, u32> = element_counts(current);

    let before_ids: BTreeSet<&str> = before.keys().copied().collect();
    let after_ids: BTreeSet<&str> = after.keys().copied().collect();

    let new_violations = after_ids.difference(&before_ids).map(|id| id.to_string()).collect();
    let resolved_violations = before_ids.difference(&after_ids).map(|id| id.to_string()).collect();
    let regressed_rule_ids = after_ids
        .intersection(&before_ids)
        .filter(|id| after[**id] > before[**id])
        .map(|id| id.to_string())
        .collect();

    HistoricalComparison {
        url: current.url.clone(),
        baseline: ResultRef::from(baseline),
        current: ResultRef::from(current),
        new_violations,
        resolved_violations,
        regressed_rule_ids,
        score_delta: i64::from(current.score) - i64::from(baseline.score),
    }
}

fn element_counts(result: &AnalysisResult) -> BTreeMap<&str, u32> {
    let mut counts = BTreeMap::new();
    for violation in &result.violations {
        *counts.entry(violation.rule_id.as_str()).or_insert(0) += violation.affected_element_count;
    }
    counts
}
