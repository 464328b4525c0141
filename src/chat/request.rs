//! Inbound chat requests and message normalization.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::message::{ChatMessage, assistant_message, tool_message, user_message};
use crate::error::ChatError;

/// Role of an inbound turn as the caller sends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// User turn.
    User,
    /// Assistant turn.
    Assistant,
    /// Anything else; dropped during normalization.
    #[serde(other)]
    Other,
}

/// One turn of the caller's conversation, in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    /// Who spoke.
    pub role: TurnRole,
    /// Turn text.
    #[serde(default)]
    pub content: String,
    /// Tool call this turn answers; required when `is_tool_result` is set.
    #[serde(default, alias = "tool_call_id", skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Marks the turn as a tool result.
    #[serde(default, alias = "is_tool_result")]
    pub is_tool_result: bool,
}

impl ConversationTurn {
    /// A user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            tool_call_id: None,
            is_tool_result: false,
        }
    }

    /// An assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            ..Self::user(content)
        }
    }
}

fn default_family() -> String {
    "openai".to_string()
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    /// Knowledge base to ground the answer in; absent selects the
    /// tool-calling branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledgebase_id: Option<i64>,
    /// Model identifier.
    pub model: String,
    /// Model family (`openai`, `ollama`).
    #[serde(default = "default_family")]
    pub family: String,
    /// Conversation, oldest first; the last turn is the question.
    pub messages: Vec<ConversationTurn>,
    /// Stream NDJSON events instead of one JSON body.
    #[serde(default)]
    pub stream: bool,
}

/// Converts inbound turns into chat messages, preserving order.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] if a tool-result turn has no
/// `toolCallId`.
pub fn normalize(turns: &[ConversationTurn]) -> Result<Vec<ChatMessage>, ChatError> {
    let mut messages = Vec::with_capacity(turns.len());
    for (position, turn) in turns.iter().enumerate() {
        if turn.is_tool_result {
            let id = turn
                .tool_call_id
                .as_deref()
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    ChatError::invalid(format!(
                        "tool result at position {position} is missing toolCallId"
                    ))
                })?;
            messages.push(tool_message(id, &turn.content));
            continue;
        }
        match turn.role {
            TurnRole::User => messages.push(user_message(&turn.content)),
            TurnRole::Assistant => messages.push(assistant_message(&turn.content)),
            TurnRole::Other => debug!(position, "dropping turn with unsupported role"),
        }
    }
    Ok(messages)
}

/// Splits normalized messages into the latest question and prior history.
///
/// # Errors
///
/// Returns [`ChatError::InvalidRequest`] if there are no messages.
pub fn split_latest(messages: &[ChatMessage]) -> Result<(&str, &[ChatMessage]), ChatError> {
    messages
        .split_last()
        .map(|(latest, history)| (latest.content.as_str(), history))
        .ok_or_else(|| ChatError::invalid("request has no messages"))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message::Role;
    use test_case::test_case;

    #[test]
    fn test_deserialize_inbound_request() {
        let body = r#"{
            "knowledgebaseId": 3,
            "model": "gpt-4o-mini",
            "family": "openai",
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "42", "toolCallId": "call_1", "isToolResult": true}
            ],
            "stream": true
        }"#;
        let request: InboundRequest =
            serde_json::from_str(body).unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(request.knowledgebase_id, Some(3));
        assert!(request.stream);
        assert!(request.messages[1].is_tool_result);
        assert_eq!(request.messages[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_defaults() {
        let request: InboundRequest =
            serde_json::from_str(r#"{"model": "m", "messages": []}"#)
                .unwrap_or_else(|e| panic!("parse failed: {e}"));
        assert_eq!(request.family, "openai");
        assert!(!request.stream);
        assert!(request.knowledgebase_id.is_none());
    }

    #[test_case("user", Some(Role::User) ; "user")]
    #[test_case("assistant", Some(Role::Assistant) ; "assistant")]
    #[test_case("system", None ; "system is dropped")]
    #[test_case("narrator", None ; "unknown is dropped")]
    fn test_role_mapping(role: &str, expected: Option<Role>) {
        let turn: ConversationTurn =
            serde_json::from_str(&format!(r#"{{"role": "{role}", "content": "x"}}"#))
                .unwrap_or_else(|e| panic!("parse failed: {e}"));
        let messages = normalize(&[turn]).unwrap_or_else(|e| panic!("normalize failed: {e}"));
        assert_eq!(messages.first().map(|m| m.role), expected);
    }

    #[test]
    fn test_normalize_preserves_order() {
        let turns = vec![
            ConversationTurn::user("one"),
            ConversationTurn::assistant("two"),
            ConversationTurn {
                tool_call_id: Some("call_9".to_string()),
                is_tool_result: true,
                ..ConversationTurn::user("three")
            },
            ConversationTurn::user("four"),
        ];
        let messages = normalize(&turns).unwrap_or_else(|e| panic!("normalize failed: {e}"));
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
        assert_eq!(messages[2].role, Role::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("call_9"));
    }

    #[test_case(None ; "missing id")]
    #[test_case(Some("") ; "empty id")]
    fn test_tool_result_without_id_rejected(id: Option<&str>) {
        let turn = ConversationTurn {
            tool_call_id: id.map(str::to_string),
            is_tool_result: true,
            ..ConversationTurn::user("result")
        };
        assert!(matches!(
            normalize(&[turn]),
            Err(ChatError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_split_latest() {
        let messages = vec![user_message("a"), assistant_message("b"), user_message("c")];
        let (latest, history) =
            split_latest(&messages).unwrap_or_else(|e| panic!("split failed: {e}"));
        assert_eq!(latest, "c");
        assert_eq!(history.len(), 2);
        assert!(split_latest(&[]).is_err());
    }
}
