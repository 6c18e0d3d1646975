//! The moderation port: an abstract text/label evaluation interface
//! plus a default keyword rule engine. The core treats this as an
//! opaque boundary — the banned set and the decision algorithm are
//! configuration, not contract.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyCategory {
    Text,
    Image,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyResult {
    pub category: SafetyCategory,
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl SafetyResult {
    pub fn passing(category: SafetyCategory) -> Self {
        Self {
            category,
            passed: true,
            reasons: Vec::new(),
        }
    }
}

/// Aggregated verdict over one or more [`SafetyResult`]s. `passed`
/// holds iff every child passed; `reasons` is the flattened union.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySummary {
    pub results: Vec<SafetyResult>,
}

impl SafetySummary {
    /// A summary for nothing evaluated: a single passing text result,
    /// per the default "there was nothing to flag" behavior.
    pub fn empty_pass() -> Self {
        Self {
            results: vec![SafetyResult::passing(SafetyCategory::Text)],
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn reasons(&self) -> Vec<String> {
        self.results.iter().flat_map(|r| r.reasons.clone()).collect()
    }
}

/// The moderation port. `evaluate_text` checks substring membership;
/// `evaluate_labels` checks exact (lowercased) membership — a label
/// list is a set of discrete tags, not free text, so a banned keyword
/// must equal a label outright to flag it.
pub trait ModerationPort: Send + Sync {
    fn evaluate_text(&self, text: &str) -> SafetyResult;
    fn evaluate_labels(&self, labels: &[String]) -> SafetyResult;
}

/// The canonical fallback engine: a configurable banned-keyword list,
/// matched case-insensitively.
pub struct KeywordModerationEngine {
    banned_keywords: Vec<String>,
}

impl KeywordModerationEngine {
    pub fn new(banned_keywords: Vec<String>) -> Self {
        Self {
            banned_keywords: banned_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl ModerationPort for KeywordModerationEngine {
    fn evaluate_text(&self, text: &str) -> SafetyResult {
        let lowered = text.to_lowercase();
        let reasons: Vec<String> = self
            .banned_keywords
            .iter()
            .filter(|kw| lowered.contains(kw.as_str()))
            .cloned()
            .collect();
        SafetyResult {
            category: SafetyCategory::Text,
            passed: reasons.is_empty(),
            reasons,
        }
    }

    fn evaluate_labels(&self, labels: &[String]) -> SafetyResult {
        let lowered: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
        let reasons: Vec<String> = self
            .banned_keywords
            .iter()
            .filter(|kw| lowered.iter().any(|label| label == *kw))
            .cloned()
            .collect();
        SafetyResult {
            category: SafetyCategory::Image,
            passed: reasons.is_empty(),
            reasons,
        }
    }
}
