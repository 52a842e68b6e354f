//! Grouping of failed tests by error category, file and recurring signature.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::runner::FailedTest;

/// Coarse classification of a failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ErrorCategory {
    #[serde(rename = "Strict Mode Violation")]
    StrictMode,
    #[serde(rename = "Timeout/Waiting")]
    Timeout,
    #[serde(rename = "Visibility")]
    Visibility,
    #[serde(rename = "Text Content")]
    TextContent,
    #[serde(rename = "URL/Navigation")]
    Navigation,
    #[serde(rename = "Assertion/Comparison")]
    Assertion,
    #[serde(rename = "Locator/Selector")]
    Locator,
    #[serde(rename = "Interaction")]
    Interaction,
    #[serde(rename = "Network")]
    Network,
    #[serde(rename = "Other")]
    Other,
}

impl ErrorCategory {
    /// First matching rule wins, so the order of checks matters.
    pub fn classify(message: &str) -> Self {
        let m = message.to_lowercase();
        let has = |needle: &str| m.contains(needle);

        if has("strict mode violation") || (has("resolved to") && has("elements")) {
            ErrorCategory::StrictMode
        } else if has("timeout") || has("waiting for") {
            ErrorCategory::Timeout
        } else if has("visible") {
            ErrorCategory::Visibility
        } else if has("tocontaintext") || has("text") {
            ErrorCategory::TextContent
        } else if has("tohaveurl") || has("url") {
            ErrorCategory::Navigation
        } else if has("tobegreaterthan") || has("tobelessthan") || has("tobe(") || has("expect(") {
            ErrorCategory::Assertion
        } else if has("locator") || has("selector") {
            ErrorCategory::Locator
        } else if has("click") || has("hover") || has("type") {
            ErrorCategory::Interaction
        } else if has("network") || has("request") || has("response") {
            ErrorCategory::Network
        } else {
            ErrorCategory::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::StrictMode => "Strict Mode Violation",
            ErrorCategory::Timeout => "Timeout/Waiting",
            ErrorCategory::Visibility => "Visibility",
            ErrorCategory::TextContent => "Text Content",
            ErrorCategory::Navigation => "URL/Navigation",
            ErrorCategory::Assertion => "Assertion/Comparison",
            ErrorCategory::Locator => "Locator/Selector",
            ErrorCategory::Interaction => "Interaction",
            ErrorCategory::Network => "Network",
            ErrorCategory::Other => "Other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewrites applied in order to the first line of a failure message.
static SIGNATURE_RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\d+", "#"),
        (r"'[^']*'", "'PLACEHOLDER'"),
        (r"Expected: .*", "Expected: VALUE"),
        (r"Received: .*", "Received: VALUE"),
    ]
    .into_iter()
    .filter_map(|(pattern, with)| Regex::new(pattern).ok().map(|re| (re, with)))
    .collect()
});

/// Normalise a failure message so that failures differing only in numbers,
/// quoted strings or compared values share a signature.
pub fn error_signature(message: &str) -> String {
    let first = message.lines().next().unwrap_or_default();
    SIGNATURE_RULES
        .iter()
        .fold(first.to_string(), |acc, (re, with)| {
            re.replace_all(&acc, *with).into_owned()
        })
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureEntry {
    pub title: String,
    pub file: String,
    /// First line of the failure message.
    pub error: String,
    pub category: ErrorCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurringPattern {
    pub signature: String,
    pub count: usize,
    pub category: ErrorCategory,
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub total_failed: usize,
    pub by_category: BTreeMap<ErrorCategory, Vec<FailureEntry>>,
    pub by_file: BTreeMap<String, Vec<FailureEntry>>,
    /// Signatures seen at least twice, most frequent first.
    pub recurring: Vec<RecurringPattern>,
}

pub fn analyze_failures<'a, I>(failed: I) -> FailureAnalysis
where
    I: IntoIterator<Item = &'a FailedTest>,
{
    let mut analysis = FailureAnalysis::default();
    let mut signatures: BTreeMap<String, RecurringPattern> = BTreeMap::new();

    for test in failed {
        analysis.total_failed += 1;
        let file = short_file_name(&test.file);
        let category = ErrorCategory::classify(&test.error);
        let entry = FailureEntry {
            title: test.title.clone(),
            file: file.clone(),
            error: test.error.lines().next().unwrap_or_default().to_string(),
            category,
        };

        analysis
            .by_category
            .entry(category)
            .or_default()
            .push(entry.clone());
        analysis.by_file.entry(file).or_default().push(entry);

        let signature = error_signature(&test.error);
        let pattern = signatures
            .entry(signature.clone())
            .or_insert_with(|| RecurringPattern {
                signature,
                count: 0,
                category,
                tests: Vec::new(),
            });
        pattern.count += 1;
        pattern.tests.push(test.title.clone());
    }

    let mut recurring: Vec<RecurringPattern> =
        signatures.into_values().filter(|p| p.count >= 2).collect();
    recurring.sort_by(|a, b| b.count.cmp(&a.count));
    analysis.recurring = recurring;
    analysis
}

fn short_file_name(path: &str) -> String {
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(title: &str, file: &str, error: &str) -> FailedTest {
        FailedTest {
            title: title.to_string(),
            file: file.to_string(),
            error: error.to_string(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            ErrorCategory::classify("Error: strict mode violation: locator('h1') resolved to 2 elements"),
            ErrorCategory::StrictMode
        );
        assert_eq!(
            ErrorCategory::classify("locator.click: Timeout 30000ms exceeded"),
            ErrorCategory::Timeout
        );
        assert_eq!(
            ErrorCategory::classify("expect(locator).toBeVisible() failed"),
            ErrorCategory::Visibility
        );
        assert_eq!(
            ErrorCategory::classify("expect(page).toHaveURL(expected) failed"),
            ErrorCategory::Navigation
        );
        assert_eq!(ErrorCategory::classify("boom"), ErrorCategory::Other);
    }

    #[test]
    fn test_signature_normalises_values() {
        let a = error_signature("Timeout 30000ms waiting for locator('nav a')\nCall log: ...");
        let b = error_signature("Timeout 5000ms waiting for locator('footer')");
        assert_eq!(a, "Timeout #ms waiting for locator('PLACEHOLDER')");
        assert_eq!(a, b);

        assert_eq!(
            error_signature("Expected: 3 Received: 4"),
            "Expected: VALUE"
        );
    }

    #[test]
    fn test_recurring_patterns_need_two_hits() {
        let tests = vec![
            failed("a", "tests/nav.spec.ts", "Timeout 100ms exceeded"),
            failed("b", "tests/nav.spec.ts", "Timeout 200ms exceeded"),
            failed("c", "tests/content.spec.ts", "Timeout 300ms exceeded"),
            failed("d", "tests/content.spec.ts", "strict mode violation"),
        ];
        let a = analyze_failures(&tests);
        assert_eq!(a.total_failed, 4);
        assert_eq!(a.recurring.len(), 1);
        assert_eq!(a.recurring[0].count, 3);
        assert_eq!(a.recurring[0].category, ErrorCategory::Timeout);
        assert_eq!(a.by_file["nav.spec.ts"].len(), 2);
        assert_eq!(a.by_category[&ErrorCategory::StrictMode].len(), 1);
    }
}
