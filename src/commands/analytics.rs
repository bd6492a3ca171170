//! Analytics commands
//!
//! Dashboard roll-ups over stored results

use chrono::Utc;

use super::AppState;
use crate::analytics::{self, TimeRange};
use crate::error::ScanError;
use crate::models::{AnalyticsSummary, Scope};

/// Get an analytics summary for a scope over a time range
///
/// # Arguments
/// * `scope` - One user's results or all results
/// * `time_range` - "24h", "7d", "30d" or "all"
///
/// Returns: Summary with an empty trend and no average when nothing matches
pub async fn get_analytics(
    state: &AppState,
    scope: Scope,
    time_range: TimeRange,
) -> Result<AnalyticsSummary, ScanError> {
    if let Scope::User(user) = &scope {
        super::analysis::user_scope(user)?;
    }
    analytics::summarize_since(state.store.as_ref(), &scope, time_range.since(Utc::now()))
}
