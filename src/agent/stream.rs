//! Incremental model output and its accumulation.
//!
//! Providers yield [`StreamChunk`]s: a text delta plus zero or more
//! tool-call fragments keyed by the call's position in the response.
//! Chunks merge associatively (the empty chunk is the identity), so a
//! [`GatheredResponse`] is just the running merge of everything received.

use std::ops::{Add, AddAssign};

use super::message::{ChatResponse, TokenUsage};
use super::tool::ToolCall;

/// A partial tool call as it arrives from a streaming provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallChunk {
    /// Position of the call within the response; fragments with the same
    /// index belong to the same call.
    pub index: u32,
    /// Call identifier, usually present only on the first fragment.
    pub id: Option<String>,
    /// Tool name, usually present only on the first fragment.
    pub name: Option<String>,
    /// Fragment of the JSON-encoded arguments.
    pub arguments: String,
}

impl ToolCallChunk {
    fn absorb(&mut self, other: &Self) {
        if self.id.is_none() {
            self.id.clone_from(&other.id);
        }
        if self.name.is_none() {
            self.name.clone_from(&other.name);
        }
        self.arguments.push_str(&other.arguments);
    }
}

/// One incremental unit of model output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Text delta.
    pub content: String,
    /// Tool-call fragments, at most one per index.
    pub tool_calls: Vec<ToolCallChunk>,
    /// Finish reason, set on the final chunk by most providers.
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// A chunk carrying only text.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// A chunk carrying only tool-call fragments.
    #[must_use]
    pub fn tool_fragments(tool_calls: Vec<ToolCallChunk>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// Returns `true` if the chunk carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.tool_calls.is_empty() && self.finish_reason.is_none()
    }

    /// Merges `other` after `self`.
    ///
    /// Text concatenates, fragments with the same index are joined (first
    /// id/name wins, arguments concatenate) and new indices keep their
    /// first-appearance order. The latest finish reason wins.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.content.push_str(&other.content);
        for fragment in other.tool_calls {
            match self.tool_calls.iter_mut().find(|c| c.index == fragment.index) {
                Some(existing) => existing.absorb(&fragment),
                None => self.tool_calls.push(fragment),
            }
        }
        if other.finish_reason.is_some() {
            self.finish_reason = other.finish_reason;
        }
        self
    }
}

impl Add for StreamChunk {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl AddAssign for StreamChunk {
    fn add_assign(&mut self, rhs: Self) {
        *self = std::mem::take(self).merge(rhs);
    }
}

/// Running accumulation of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatheredResponse {
    merged: StreamChunk,
}

impl GatheredResponse {
    /// Folds the next chunk into the accumulation.
    pub fn push(&mut self, chunk: StreamChunk) {
        self.merged += chunk;
    }

    /// Text gathered so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.merged.content
    }

    /// Finish reason of the last chunk that carried one.
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.merged.finish_reason.as_deref()
    }

    /// Tool calls whose id and name have both arrived, in the order the
    /// model started them.
    #[must_use]
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.merged
            .tool_calls
            .iter()
            .filter_map(|c| {
                Some(ToolCall {
                    id: c.id.clone()?,
                    name: c.name.clone()?,
                    arguments: c.arguments.clone(),
                })
            })
            .collect()
    }

    /// Converts the accumulation into a synchronous-style response.
    #[must_use]
    pub fn into_response(self) -> ChatResponse {
        let tool_calls = self.tool_calls();
        ChatResponse {
            content: self.merged.content,
            usage: TokenUsage::default(),
            tool_calls,
            finish_reason: self.merged.finish_reason,
        }
    }
}

impl FromIterator<StreamChunk> for GatheredResponse {
    fn from_iter<I: IntoIterator<Item = StreamChunk>>(iter: I) -> Self {
        let mut gathered = Self::default();
        for chunk in iter {
            gathered.push(chunk);
        }
        gathered
    }
}
