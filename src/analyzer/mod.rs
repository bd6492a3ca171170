//! Violation analyzer
//!
//! Turns a raw violation set from the page auditor into severity-ranked,
//! categorized findings and a compliance score. Pure: same input, same
//! output, no I/O.

pub mod rules;

use std::collections::BTreeMap;

use crate::models::{
    Findings, RawViolation, Severity, SeverityCounts, StructuredViolation, WcagLevel,
};

pub const MAX_SCORE: u32 = 100;

/// Analyze a raw violation set at the requested WCAG level
///
/// 1. Entries with no affected nodes are dropped.
/// 2. Entries for rules stricter than `level` are dropped.
/// 3. Entries sharing a rule id collapse into one violation (node counts
///    summed, most severe impact wins).
/// 4. Score starts at 100 and loses a fixed weight per distinct rule,
///    floored at 0.
pub fn analyze(raw: &[RawViolation], level: WcagLevel) -> Findings {
    let mut by_rule: BTreeMap<&str, StructuredViolation> = BTreeMap::new();

    for entry in raw.iter().filter(|v| v.node_count > 0 && applies(v, level)) {
        let severity = Severity::from_impact(entry.impact.as_deref());

        by_rule
            .entry(entry.rule_id.as_str())
            .and_modify(|existing| {
                existing.affected_element_count =
                    existing.affected_element_count.saturating_add(entry.node_count);
                existing.severity = existing.severity.max(severity);
                if existing.help_url.is_none() {
                    existing.help_url = entry.help_url.clone();
                }
            })
            .or_insert_with(|| structure(entry, severity));
    }

    let mut violations: Vec<StructuredViolation> = by_rule.into_values().collect();
    // BTreeMap already ordered by rule id; the stable sort keeps that within a severity
    violations.sort_by(|a, b| b.severity.cmp(&a.severity));

    let mut counts = SeverityCounts::default();
    for violation in &violations {
        counts.increment(violation.severity);
    }

    Findings {
        score: score(&violations),
        violations_by_severity: counts,
        violations,
        wcag_level: level,
    }
}

/// 100 minus the per-severity weight of every distinct violated rule, floored at 0
pub fn score(violations: &[StructuredViolation]) -> u32 {
    let penalty: u32 = violations
        .iter()
        .map(|v| v.severity.score_weight())
        .fold(0u32, |acc, w| acc.saturating_add(w));
    MAX_SCORE.saturating_sub(penalty)
}

fn applies(entry: &RawViolation, level: WcagLevel) -> bool {
    match rules::rule_level(&entry.rule_id, &entry.tags) {
        Some(rule_level) => level.includes(rule_level),
        None => true,
    }
}

fn structure(entry: &RawViolation, severity: Severity) -> StructuredViolation {
    let category = rules::categorize(&entry.rule_id);
    StructuredViolation {
        rule_id: entry.rule_id.clone(),
        category,
        severity,
        affected_element_count: entry.node_count,
        description: entry.description.clone(),
        remediation: rules::remediation(&entry.rule_id, category).to_string(),
        help_url: entry.help_url.clone(),
    }
}
