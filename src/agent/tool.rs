//! Tool type definitions for function-calling.
//!
//! Provider-agnostic types for tool schemas, model-requested calls, and
//! their results. The executable side lives in [`super::catalog`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChatError;

/// Maximum raw byte length of tool argument JSON from the LLM.
const MAX_TOOL_ARGS_LEN: usize = 100_000;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique within a catalog).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// A completed tool call requested by the LLM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}

impl ToolCall {
    /// Decodes the JSON arguments into a structured value.
    ///
    /// Empty argument strings decode to an empty object, which is what
    /// providers send for parameterless tools.
    pub fn parse_arguments(&self) -> Result<Value, ChatError> {
        if self.arguments.len() > MAX_TOOL_ARGS_LEN {
            return Err(ChatError::ToolExecution {
                name: self.name.clone(),
                message: format!(
                    "tool arguments too large ({} bytes, max {MAX_TOOL_ARGS_LEN})",
                    self.arguments.len()
                ),
            });
        }
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments).map_err(|e| ChatError::ToolExecution {
            name: self.name.clone(),
            message: format!("invalid arguments: {e}"),
        })
    }
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that produced it.
    pub name: String,
    /// Raw result: a string for built-in tools, anything the registry
    /// returns for external ones.
    pub content: Value,
}

impl ToolResult {
    /// Renders the result as message text for a follow-up model turn.
    #[must_use]
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: "calculator".to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_parse_arguments_object() {
        let args = call(r#"{"operation":"add","number1":1,"number2":2}"#)
            .parse_arguments()
            .unwrap_or_default();
        assert_eq!(args["operation"], "add");
    }

    #[test]
    fn test_parse_arguments_empty_is_object() {
        let args = call("  ").parse_arguments().unwrap_or_default();
        assert!(args.as_object().is_some_and(serde_json::Map::is_empty));
    }

    #[test]
    fn test_parse_arguments_invalid() {
        let err = call("{not json").parse_arguments();
        assert!(matches!(err, Err(ChatError::ToolExecution { .. })));
    }

    #[test]
    fn test_parse_arguments_too_large() {
        let big = format!("\"{}\"", "x".repeat(MAX_TOOL_ARGS_LEN + 1));
        assert!(call(&big).parse_arguments().is_err());
    }

    #[test]
    fn test_content_text() {
        let plain = ToolResult {
            tool_call_id: "a".to_string(),
            name: "calculator".to_string(),
            content: Value::String("2".to_string()),
        };
        assert_eq!(plain.content_text(), "2");

        let structured = ToolResult {
            content: serde_json::json!({"temp": 21}),
            ..plain
        };
        assert_eq!(structured.content_text(), r#"{"temp":21}"#);
    }
}
