use serde::{Deserialize, Serialize};

/// Normalized severity bucket
///
/// Declared from least to most severe so `Ord` follows severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Serious,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Serious,
        Severity::Moderate,
        Severity::Minor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Serious => "serious",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Severity::Critical),
            "serious" => Some(Severity::Serious),
            "moderate" => Some(Severity::Moderate),
            "minor" => Some(Severity::Minor),
            _ => None,
        }
    }

    /// Normalize an auditor-reported impact onto the 4-point scale
    ///
    /// Unknown or missing impacts land on `Moderate`.
    pub fn from_impact(impact: Option<&str>) -> Self {
        let Some(impact) = impact else {
            return Severity::Moderate;
        };
        match impact.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" => Severity::Critical,
            "serious" | "high" | "major" => Severity::Serious,
            "moderate" | "medium" => Severity::Moderate,
            "minor" | "low" | "trivial" => Severity::Minor,
            _ => Severity::Moderate,
        }
    }

    /// Points deducted from the compliance score per distinct violated rule
    pub fn score_weight(&self) -> u32 {
        match self {
            Severity::Critical => 10,
            Severity::Serious => 5,
            Severity::Moderate => 2,
            Severity::Minor => 1,
        }
    }
}

/// Fixed violation categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    #[serde(rename = "color-contrast")]
    ColorContrast,
    #[serde(rename = "keyboard")]
    Keyboard,
    #[serde(rename = "aria")]
    Aria,
    #[serde(rename = "forms")]
    Forms,
    #[serde(rename = "structure")]
    Structure,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::ColorContrast,
        Category::Keyboard,
        Category::Aria,
        Category::Forms,
        Category::Structure,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ColorContrast => "color-contrast",
            Category::Keyboard => "keyboard",
            Category::Aria => "aria",
            Category::Forms => "forms",
            Category::Structure => "structure",
            Category::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "color-contrast" => Some(Category::ColorContrast),
            "keyboard" => Some(Category::Keyboard),
            "aria" => Some(Category::Aria),
            "forms" => Some(Category::Forms),
            "structure" => Some(Category::Structure),
            "other" => Some(Category::Other),
            _ => None,
        }
    }
}

/// One unprocessed finding as emitted by the page auditor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawViolation {
    pub rule_id: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub help_url: Option<String>,
    pub node_count: u32,
    /// Rule tags such as `wcag2aa` or `best-practice`
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RawViolation {
    pub fn new(rule_id: impl Into<String>, impact: &str, node_count: u32) -> Self {
        Self {
            rule_id: rule_id.into(),
            impact: Some(impact.to_string()),
            node_count,
            ..Default::default()
        }
    }
}

pub type RawViolationSet = Vec<RawViolation>;

/// A normalized, categorized, severity-ranked violation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredViolation {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub affected_element_count: u32,
    pub description: String,
    pub remediation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help_url: Option<String>,
}

/// Violation counts per severity bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SeverityCounts {
    pub critical: u32,
    pub serious: u32,
    pub moderate: u32,
    pub minor: u32,
}

impl SeverityCounts {
    pub fn increment(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::Serious => self.serious += 1,
            Severity::Moderate => self.moderate += 1,
            Severity::Minor => self.minor += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Serious => self.serious,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
        }
    }

    pub fn total(&self) -> u32 {
        self.critical + self.serious + self.moderate + self.minor
    }

    pub fn add(&mut self, other: &SeverityCounts) {
        self.critical += other.critical;
        self.serious += other.serious;
        self.moderate += other.moderate;
        self.minor += other.minor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_severity_as_str() {
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::Serious.as_str(), "serious");
        assert_eq!(Severity::Moderate.as_str(), "moderate");
        assert_eq!(Severity::Minor.as_str(), "minor");
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!(Severity::from_str("critical"), Some(Severity::Critical));
        assert_eq!(Severity::from_str("minor"), Some(Severity::Minor));
        assert_eq!(Severity::from_str("high"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Serious);
        assert!(Severity::Serious > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Minor);
    }

    #[rstest]
    #[case(Some("critical"), Severity::Critical)]
    #[case(Some("Serious"), Severity::Serious)]
    #[case(Some(" moderate "), Severity::Moderate)]
    #[case(Some("minor"), Severity::Minor)]
    #[case(Some("high"), Severity::Serious)]
    #[case(Some("low"), Severity::Minor)]
    #[case(Some("catastrophic"), Severity::Moderate)]
    #[case(None, Severity::Moderate)]
    fn test_impact_normalization(#[case] impact: Option<&str>, #[case] expected: Severity) {
        assert_eq!(Severity::from_impact(impact), expected);
    }

    #[test]
    fn test_score_weights() {
        assert_eq!(Severity::Critical.score_weight(), 10);
        assert_eq!(Severity::Serious.score_weight(), 5);
        assert_eq!(Severity::Moderate.score_weight(), 2);
        assert_eq!(Severity::Minor.score_weight(), 1);
    }

    #[test]
    fn test_category_names_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_str(category.as_str()), Some(category));
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.as_str()));
        }
    }

    #[test]
    fn test_raw_violation_deserializes_auditor_payload() {
        let json = r#"{
            "ruleId": "image-alt",
            "impact": "critical",
            "selector": "img.hero",
            "description": "Images must have alternate text",
            "helpUrl": "https://dequeuniversity.com/rules/axe/4.8/image-alt",
            "nodeCount": 3,
            "tags": ["wcag2a", "wcag111"]
        }"#;
        let raw: RawViolation = serde_json::from_str(json).unwrap();
        assert_eq!(raw.rule_id, "image-alt");
        assert_eq!(raw.node_count, 3);
        assert_eq!(raw.tags.len(), 2);
    }

    #[test]
    fn test_severity_counts() {
        let mut counts = SeverityCounts::default();
        counts.increment(Severity::Critical);
        counts.increment(Severity::Minor);
        counts.increment(Severity::Minor);
        assert_eq!(counts.get(Severity::Critical), 1);
        assert_eq!(counts.get(Severity::Minor), 2);
        assert_eq!(counts.total(), 3);
    }
}
