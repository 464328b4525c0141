//! Output formatting for CLI commands.

use std::fmt::Write as _;

use serde::Serialize;

use crate::rag::{EmbeddingProvider, KnowledgeBase};

/// How command results are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// Parses a `--format` value; anything unrecognised is text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }

    /// Serializes `value` as pretty JSON with a trailing newline.
    #[must_use]
    pub fn to_json<T: Serialize>(self, value: &T) -> String {
        let mut out = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
            serde_json::json!({"error": "serialization", "message": e.to_string()}).to_string()
        });
        out.push('\n');
        out
    }
}

/// Renders the knowledge-base listing.
#[must_use]
pub fn format_knowledge_bases(bases: &[KnowledgeBase], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(&bases),
        OutputFormat::Text => {
            if bases.is_empty() {
                return "No knowledge bases.\n".to_string();
            }
            let mut out = format!("{:<6} {:<32} {}\n", "ID", "NAME", "PROVIDER");
            for kb in bases {
                let _ = writeln!(
                    out,
                    "{:<6} {:<32} {}",
                    kb.id, kb.name, kb.embedding_provider_id
                );
            }
            out
        }
    }
}

/// Renders the embedding-provider listing.
#[must_use]
pub fn format_providers(providers: &[EmbeddingProvider], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => format.to_json(&providers),
        OutputFormat::Text => {
            if providers.is_empty() {
                return "No embedding providers.\n".to_string();
            }
            let mut out = format!("{:<6} {:<20} {:<32} {}\n", "ID", "NAME", "MODEL", "BASE URL");
            for p in providers {
                let _ = writeln!(
                    out,
                    "{:<6} {:<20} {:<32} {}",
                    p.id,
                    p.name,
                    p.model,
                    p.base_url.as_deref().unwrap_or("-")
                );
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("json", OutputFormat::Json)]
    #[test_case("JSON", OutputFormat::Json)]
    #[test_case("text", OutputFormat::Text)]
    #[test_case("yaml", OutputFormat::Text ; "unknown falls back to text")]
    fn test_parse(input: &str, expected: OutputFormat) {
        assert_eq!(OutputFormat::parse(input), expected);
    }

    #[test]
    fn test_knowledge_base_text_table() {
        let bases = vec![KnowledgeBase {
            id: 3,
            name: "handbook".to_string(),
            embedding_provider_id: 1,
        }];
        let text = format_knowledge_bases(&bases, OutputFormat::Text);
        assert!(text.starts_with("ID"));
        assert!(text.contains("handbook"));
        assert_eq!(
            format_knowledge_bases(&[], OutputFormat::Text),
            "No knowledge bases.\n"
        );
    }

    #[test]
    fn test_providers_json() {
        let providers = vec![EmbeddingProvider {
            id: 1,
            name: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            base_url: None,
        }];
        let json: serde_json::Value =
            serde_json::from_str(&format_providers(&providers, OutputFormat::Json))
                .unwrap_or_default();
        assert_eq!(json[0]["model"], "text-embedding-3-small");
        assert!(json[0]["base_url"].is_null());
    }
}
