//! Retrieved evidence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A retrieved passage with optional relevance score.
///
/// Lives for one request; never persisted in this form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDocument {
    /// Passage text.
    pub text: String,
    /// Arbitrary metadata stored alongside the passage.
    #[serde(default)]
    pub metadata: Value,
    /// Similarity or rerank score, higher is better.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl EvidenceDocument {
    /// Creates an unscored document.
    #[must_use]
    pub fn new(text: impl Into<String>, metadata: Value) -> Self {
        Self {
            text: text.into(),
            metadata,
            score: None,
        }
    }

    /// Returns the document with `score` attached.
    #[must_use]
    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Joins passage texts into the prompt's context block.
#[must_use]
pub fn join_context(documents: &[EvidenceDocument]) -> String {
    documents
        .iter()
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_context() {
        let docs = vec![
            EvidenceDocument::new("first", json!({})),
            EvidenceDocument::new("second", json!({"page": 2})),
        ];
        assert_eq!(join_context(&docs), "first\n\nsecond");
        assert_eq!(join_context(&[]), "");
    }

    #[test]
    fn test_score_omitted_when_absent() {
        let doc = EvidenceDocument::new("text", json!({"source": "a.md"}));
        let value = serde_json::to_value(&doc).unwrap_or_else(|_| unreachable!());
        assert!(value.get("score").is_none());
        assert_eq!(value["metadata"]["source"], "a.md");

        let scored = serde_json::to_value(doc.with_score(0.5)).unwrap_or_else(|_| unreachable!());
        assert_eq!(scored["score"], 0.5);
    }
}
