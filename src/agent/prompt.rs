//! Prompt templates and the prompt assembler.
//!
//! Two templates drive the RAG branch: the reformulation system prompt and
//! the answer template with `{context}`, `{chat_history}` and `{question}`
//! slots. Both can be overridden from a prompt directory.

use std::path::{Path, PathBuf};

use super::message::ChatMessage;

/// System prompt for query reformulation.
pub const REFORMULATE_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question which can be \
understood without the chat history. Do NOT answer the question, just reformulate it if needed \
and otherwise return it as is.";

/// Answer template for the RAG branch.
pub const RAG_TEMPLATE: &str = r"You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question. If you don't know the answer, just say that you don't know. Use three sentences maximum and keep the answer concise.

Context:
{context}

Chat history:
{chat_history}

Question: {question}

Answer:";

/// Default prompt directory relative to the user's home.
const DEFAULT_PROMPT_DIR: &str = ".config/ragline/prompts";

/// Filename for the reformulation prompt.
const REFORMULATE_FILENAME: &str = "reformulate.md";
/// Filename for the RAG answer template.
const RAG_FILENAME: &str = "rag.md";

/// Resolved prompt templates.
///
/// Each field holds either a user-customised template loaded from disk or
/// the compiled-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    /// System prompt for the query reformulator.
    pub reformulate: String,
    /// Answer template for the RAG branch.
    pub rag: String,
}

impl PromptSet {
    /// Loads prompts from the given directory, falling back to compiled-in defaults.
    ///
    /// Without an explicit directory, `~/.config/ragline/prompts/` is tried.
    /// Each file is loaded independently; a missing file uses its default.
    #[must_use]
    pub fn load(prompt_dir: Option<&Path>) -> Self {
        let resolved_dir = prompt_dir.map(PathBuf::from).or_else(Self::default_dir);

        let load_file = |filename: &str, default: &str| -> String {
            resolved_dir
                .as_ref()
                .map(|dir| dir.join(filename))
                .and_then(|path| std::fs::read_to_string(&path).ok())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            reformulate: load_file(REFORMULATE_FILENAME, REFORMULATE_SYSTEM_PROMPT),
            rag: load_file(RAG_FILENAME, RAG_TEMPLATE),
        }
    }

    /// Returns compiled-in defaults without checking the filesystem.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            reformulate: REFORMULATE_SYSTEM_PROMPT.to_string(),
            rag: RAG_TEMPLATE.to_string(),
        }
    }

    /// Writes the compiled-in default prompts to the given directory.
    ///
    /// Creates the directory if it does not exist. Existing files are
    /// **not** overwritten.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if directory creation or file writing fails.
    pub fn write_defaults(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let templates = [
            (REFORMULATE_FILENAME, REFORMULATE_SYSTEM_PROMPT),
            (RAG_FILENAME, RAG_TEMPLATE),
        ];

        let mut written = Vec::new();
        for (filename, content) in &templates {
            let path = dir.join(filename);
            if !path.exists() {
                std::fs::write(&path, content)?;
                written.push(path);
            }
        }

        Ok(written)
    }

    /// Returns the default prompt directory under the user's home.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_PROMPT_DIR))
    }

    /// Renders the RAG answer prompt.
    #[must_use]
    pub fn render_rag(&self, question: &str, chat_history: &str, context: &str) -> String {
        render_template(
            &self.rag,
            &[
                ("question", question),
                ("chat_history", chat_history),
                ("context", context),
            ],
        )
    }
}

/// Substitutes `{name}` slots in a single left-to-right pass.
///
/// Substituted values are never rescanned, so braces inside a question or
/// a retrieved passage come through verbatim. Unknown slots are left as is.
#[must_use]
pub fn render_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Serializes history as `role: content` lines in conversation order.
#[must_use]
pub fn serialize_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
