use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobState;

/// WCAG conformance tier requested for a scan
///
/// Ordered so that `A < AA < AAA`; a stricter level is a superset of the
/// looser ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WcagLevel {
    #[serde(rename = "A")]
    A,
    #[serde(rename = "AA")]
    AA,
    #[serde(rename = "AAA")]
    AAA,
}

impl WcagLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WcagLevel::A => "A",
            WcagLevel::AA => "AA",
            WcagLevel::AAA => "AAA",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(WcagLevel::A),
            "AA" => Some(WcagLevel::AA),
            "AAA" => Some(WcagLevel::AAA),
            _ => None,
        }
    }

    /// Whether a rule tagged for `rule_level` applies when `self` is requested
    pub fn includes(&self, rule_level: WcagLevel) -> bool {
        rule_level <= *self
    }
}

impl Default for WcagLevel {
    fn default() -> Self {
        WcagLevel::AA
    }
}

/// Browser viewport used to render the page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Per-request scan settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScanSettings {
    #[serde(default)]
    pub wcag_level: WcagLevel,
    #[serde(default)]
    pub viewport: Viewport,
    /// Upper bound for the audit itself; the scheduler default applies when unset
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A submitted request to analyze one URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub id: Uuid,
    pub url: String,
    /// Owning user, `None` for anonymous (public) submissions
    pub requester_ref: Option<String>,
    pub settings: ScanSettings,
    pub created_at: DateTime<Utc>,
    pub status: JobState,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>, requester_ref: Option<String>, settings: ScanSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            requester_ref,
            settings,
            created_at: Utc::now(),
            status: JobState::Queued,
        }
    }

    pub fn is_public(&self) -> bool {
        self.requester_ref.is_none()
    }
}

/// Which slice of scan history an aggregate or listing covers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", tag = "type", content = "user")]
pub enum Scope {
    /// Results owned by one user
    User(String),
    /// Every stored result
    Global,
}

impl Scope {
    pub fn user(id: impl Into<String>) -> Self {
        Scope::User(id.into())
    }

    pub fn matches(&self, requester_ref: Option<&str>) -> bool {
        match self {
            Scope::Global => true,
            Scope::User(user) => requester_ref == Some(user.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wcag_level_as_str() {
        assert_eq!(WcagLevel::A.as_str(), "A");
        assert_eq!(WcagLevel::AA.as_str(), "AA");
        assert_eq!(WcagLevel::AAA.as_str(), "AAA");
    }

    #[test]
    fn test_wcag_level_from_str() {
        assert_eq!(WcagLevel::from_str("a"), Some(WcagLevel::A));
        assert_eq!(WcagLevel::from_str("AA"), Some(WcagLevel::AA));
        assert_eq!(WcagLevel::from_str(" aaa "), Some(WcagLevel::AAA));
        assert_eq!(WcagLevel::from_str("AAAA"), None);
    }

    #[test]
    fn test_wcag_level_includes_looser_levels() {
        assert!(WcagLevel::AAA.includes(WcagLevel::A));
        assert!(WcagLevel::AAA.includes(WcagLevel::AA));
        assert!(WcagLevel::AA.includes(WcagLevel::A));
        assert!(!WcagLevel::AA.includes(WcagLevel::AAA));
        assert!(!WcagLevel::A.includes(WcagLevel::AA));
    }

    #[test]
    fn test_request_creation() {
        let request = AnalysisRequest::new("https://example.com", None, ScanSettings::default());
        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.status, JobState::Queued);
        assert_eq!(request.settings.wcag_level, WcagLevel::AA);
        assert!(request.is_public());
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: ScanSettings = serde_json::from_str(r#"{"wcagLevel":"AAA"}"#).unwrap();
        assert_eq!(settings.wcag_level, WcagLevel::AAA);
        assert_eq!(settings.viewport, Viewport::default());
        assert_eq!(settings.timeout_ms, None);
    }

    #[test]
    fn test_scope_matches() {
        assert!(Scope::Global.matches(None));
        assert!(Scope::Global.matches(Some("alice")));
        assert!(Scope::user("alice").matches(Some("alice")));
        assert!(!Scope::user("alice").matches(Some("bob")));
        assert!(!Scope::user("alice").matches(None));
    }
}
