//! Accessibility rule catalog
//!
//! Static knowledge about the rule ids the page auditor emits: the WCAG
//! level a rule belongs to, its category and a short remediation hint.
//! Rule ids follow axe-core naming.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::{Category, WcagLevel};

#[derive(Debug, Clone, Copy)]
pub struct RuleInfo {
    pub id: &'static str,
    /// `None` for best-practice rules that are not tied to a WCAG level
    pub level: Option<WcagLevel>,
    pub category: Category,
    pub remediation: &'static str,
}

const fn rule(
    id: &'static str,
    level: Option<WcagLevel>,
    category: Category,
    remediation: &'static str,
) -> RuleInfo {
    RuleInfo {
        id,
        level,
        category,
        remediation,
    }
}

use Category::*;
use WcagLevel::{A, AA, AAA};

#[rustfmt::skip]
pub const RULES: &[RuleInfo] = &[
    // Color and contrast
    rule("color-contrast", Some(AA), ColorContrast,
        "Increase the contrast ratio between text and background to at least 4.5:1 (3:1 for large text)."),
    rule("color-contrast-enhanced", Some(AAA), ColorContrast,
        "Increase the contrast ratio between text and background to at least 7:1 (4.5:1 for large text)."),
    rule("link-in-text-block", Some(A), ColorContrast,
        "Distinguish links from surrounding text by more than color, e.g. with an underline."),

    // Keyboard
    rule("tabindex", None, Keyboard,
        "Avoid positive tabindex values; let the DOM order define focus order."),
    rule("bypass", Some(A), Keyboard,
        "Provide a skip link or landmarks so keyboard users can bypass repeated blocks."),
    rule("scrollable-region-focusable", Some(A), Keyboard,
        "Make scrollable regions focusable so they can be scrolled with the keyboard."),
    rule("accesskeys", None, Keyboard,
        "Give every accesskey a unique value."),
    rule("frame-focusable-content", Some(A), Keyboard,
        "Do not set tabindex=-1 on frames that contain focusable content."),
    rule("nested-interactive", Some(A), Keyboard,
        "Do not nest interactive controls inside other interactive controls."),
    rule("skip-link", None, Keyboard,
        "Point skip links at an existing, focusable target."),

    // ARIA
    rule("aria-allowed-attr", Some(A), Aria,
        "Only use ARIA attributes that are allowed for the element's role."),
    rule("aria-hidden-focus", Some(A), Aria,
        "Remove focusable content from aria-hidden regions or make it unfocusable."),
    rule("aria-required-attr", Some(A), Aria,
        "Add every ARIA attribute required by the element's role."),
    rule("aria-roles", Some(A), Aria,
        "Use valid ARIA role values."),
    rule("aria-valid-attr", Some(A), Aria,
        "Fix misspelled or non-existent ARIA attribute names."),
    rule("aria-valid-attr-value", Some(A), Aria,
        "Give ARIA attributes valid values."),

    // Forms
    rule("label", Some(A), Forms,
        "Associate every form control with a visible <label> or an accessible name."),
    rule("button-name", Some(A), Forms,
        "Give every button discernible text or an aria-label."),
    rule("select-name", Some(A), Forms,
        "Give every select element an accessible name."),
    rule("input-button-name", Some(A), Forms,
        "Give input buttons a value or aria-label."),
    rule("input-image-alt", Some(A), Forms,
        "Give image inputs alternate text."),
    rule("autocomplete-valid", Some(AA), Forms,
        "Use valid autocomplete tokens on personal-data fields."),
    rule("form-field-multiple-labels", None, Forms,
        "Give each form field exactly one label."),

    // Structure
    rule("document-title", Some(A), Structure,
        "Add a descriptive, non-empty <title> element."),
    rule("html-has-lang", Some(A), Structure,
        "Add a lang attribute to the <html> element."),
    rule("html-lang-valid", Some(A), Structure,
        "Use a valid BCP 47 language code in the lang attribute."),
    rule("heading-order", None, Structure,
        "Increase heading levels one at a time."),
    rule("page-has-heading-one", None, Structure,
        "Add a single level-one heading describing the page."),
    rule("region", None, Structure,
        "Place all page content inside landmark regions."),
    rule("list", Some(A), Structure,
        "Only put <li>, <script> or <template> elements directly inside lists."),
    rule("listitem", Some(A), Structure,
        "Place <li> elements inside a <ul> or <ol>."),
    rule("meta-viewport", Some(AA), Structure,
        "Do not disable zooming with user-scalable=no or maximum-scale below 2."),
    rule("target-size", Some(AA), Structure,
        "Make touch targets at least 24 by 24 CSS pixels."),

    // Other
    rule("image-alt", Some(A), Other,
        "Give every informative image an alt attribute; use alt=\"\" for decorative images."),
    rule("link-name", Some(A), Other,
        "Give every link discernible text."),
    rule("frame-title", Some(A), Other,
        "Give every frame and iframe a title."),
    rule("video-caption", Some(A), Other,
        "Provide captions for video content."),
    rule("identical-links-same-purpose", Some(AAA), Other,
        "Links with the same accessible name should lead to the same destination."),
];

static CATALOG: Lazy<HashMap<&'static str, &'static RuleInfo>> =
    Lazy::new(|| RULES.iter().map(|r| (r.id, r)).collect());

/// Rule id prefixes that identify a category for rules missing from the catalog
const CATEGORY_PREFIXES: &[(&str, Category)] = &[
    ("color-contrast", ColorContrast),
    ("aria-", Aria),
    ("label", Forms),
    ("input-", Forms),
    ("autocomplete", Forms),
    ("form-", Forms),
    ("focus", Keyboard),
    ("tabindex", Keyboard),
    ("keyboard", Keyboard),
    ("landmark-", Structure),
    ("heading", Structure),
    ("page-has-", Structure),
    ("html-", Structure),
    ("list", Structure),
];

pub fn lookup(rule_id: &str) -> Option<&'static RuleInfo> {
    CATALOG.get(rule_id).copied()
}

/// Category for a rule id: catalog first, then known prefixes, else `Other`
pub fn categorize(rule_id: &str) -> Category {
    if let Some(info) = lookup(rule_id) {
        return info.category;
    }
    CATEGORY_PREFIXES
        .iter()
        .find(|(prefix, _)| rule_id.starts_with(prefix))
        .map(|(_, category)| *category)
        .unwrap_or(Other)
}

/// WCAG level from auditor tags such as `wcag2a`, `wcag21aa` or `wcag2aaa`
///
/// Success-criterion tags like `wcag143` carry no level and are ignored.
/// The strictest level found wins.
pub fn level_from_tags(tags: &[String]) -> Option<WcagLevel> {
    tags.iter()
        .filter_map(|tag| {
            let rest = tag.strip_prefix("wcag")?;
            let letters = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            match letters {
                "a" => Some(A),
                "aa" => Some(AA),
                "aaa" => Some(AAA),
                _ => None,
            }
        })
        .max()
}

/// Level a rule belongs to; tags beat the catalog
pub fn rule_level(rule_id: &str, tags: &[String]) -> Option<WcagLevel> {
    level_from_tags(tags).or_else(|| lookup(rule_id).and_then(|info| info.level))
}

/// Remediation hint: the catalog's, or a generic one for the category
pub fn remediation(rule_id: &str, category: Category) -> &'static str {
    if let Some(info) = lookup(rule_id) {
        return info.remediation;
    }
    match category {
        ColorContrast => "Adjust foreground and background colors to meet WCAG contrast ratios.",
        Keyboard => "Ensure the element can be reached and operated with the keyboard alone.",
        Aria => "Review ARIA roles and attributes against the WAI-ARIA specification.",
        Forms => "Give form controls accessible names, labels and instructions.",
        Structure => "Use semantic HTML landmarks, headings and document metadata.",
        Other => "Review the rule documentation and fix the affected elements.",
    }
}
