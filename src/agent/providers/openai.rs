//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, Ollama, local
//! proxies) via the base URL override. Whether tool schemas are bound is
//! decided at construction time.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCallChunk,
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestToolMessage,
    ChatCompletionRequestUserMessage, ChatCompletionTool, ChatCompletionToolType,
    CreateChatCompletionRequest, CreateChatCompletionStreamResponse, FunctionCall,
    FunctionObject,
};
use async_trait::async_trait;
use futures_util::StreamExt;

use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::{ChunkStream, LlmProvider};
use crate::agent::stream::{StreamChunk, ToolCallChunk};
use crate::agent::tool::ToolCall;
use crate::error::ChatError;

/// `OpenAI`-compatible LLM provider.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    name: &'static str,
    tool_binding: bool,
}

impl OpenAiProvider {
    /// Creates a provider for the given endpoint.
    #[must_use]
    pub fn new(
        name: &'static str,
        api_key: &str,
        base_url: Option<&str>,
        tool_binding: bool,
    ) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);

        if let Some(base_url) = base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            name,
            tool_binding,
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                        msg.content.clone(),
                    ),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                    msg.content.clone(),
                ),
                name: None,
            }),
            Role::Assistant => {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|tc| ChatCompletionMessageToolCall {
                                id: tc.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                let content = if msg.content.is_empty() {
                    None
                } else {
                    Some(
                        async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                            msg.content.clone(),
                        ),
                    )
                };

                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content,
                    name: None,
                    tool_calls,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
            Role::Tool => ChatCompletionRequestMessage::Tool(ChatCompletionRequestToolMessage {
                content: async_openai::types::ChatCompletionRequestToolMessageContent::Text(
                    msg.content.clone(),
                ),
                tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
            }),
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    ///
    /// Tools are dropped when this provider does not bind them.
    fn build_request(&self, request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let tools = if request.tools.is_empty() || !self.tool_binding {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|td| ChatCompletionTool {
                        r#type: ChatCompletionToolType::Function,
                        function: FunctionObject {
                            name: td.name.clone(),
                            description: Some(td.description.clone()),
                            parameters: Some(td.parameters.clone()),
                            strict: None,
                        },
                    })
                    .collect(),
            )
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream: if request.stream { Some(true) } else { None },
            tools,
            ..Default::default()
        }
    }

    fn convert_tool_chunk(chunk: &ChatCompletionMessageToolCallChunk) -> ToolCallChunk {
        let function = chunk.function.as_ref();
        ToolCallChunk {
            index: chunk.index,
            id: chunk.id.clone().filter(|id| !id.is_empty()),
            name: function
                .and_then(|f| f.name.clone())
                .filter(|name| !name.is_empty()),
            arguments: function
                .and_then(|f| f.arguments.clone())
                .unwrap_or_default(),
        }
    }

    fn convert_stream_response(response: &CreateChatCompletionStreamResponse) -> StreamChunk {
        let Some(choice) = response.choices.first() else {
            return StreamChunk::default();
        };
        StreamChunk {
            content: choice.delta.content.clone().unwrap_or_default(),
            tool_calls: choice
                .delta
                .tool_calls
                .as_ref()
                .map(|tcs| tcs.iter().map(Self::convert_tool_chunk).collect())
                .unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase()),
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("name", &self.name)
            .field("tool_binding", &self.tool_binding)
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports_tool_binding(&self) -> bool {
        self.tool_binding
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let openai_request = self.build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| ChatError::UpstreamModel {
                message: e.to_string(),
                status: None,
            })?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let tool_calls = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(ChatResponse {
            content,
            usage,
            tool_calls,
            finish_reason,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError> {
        let mut stream_request = request.clone();
        stream_request.stream = true;
        let openai_request = self.build_request(&stream_request);

        let stream = self
            .client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(|e| ChatError::UpstreamModel {
                message: e.to_string(),
                status: None,
            })?;

        let mapped = stream.map(|result| match result {
            Ok(response) => Ok(Self::convert_stream_response(&response)),
            Err(e) => Err(ChatError::Stream {
                message: e.to_string(),
            }),
        });

        Ok(Box::pin(mapped))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolDefinition;
    use async_openai::types::FunctionCallStream;

    fn provider(tool_binding: bool) -> OpenAiProvider {
        OpenAiProvider::new("openai", "test", None, tool_binding)
    }

    fn request_with_tool() -> ChatRequest {
        ChatRequest::new("gpt-4o-mini", vec![message::user_message("test")]).with_tools(vec![
            ToolDefinition {
                name: "calculator".to_string(),
                description: "Arithmetic".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
        ])
    }

    #[test]
    fn test_convert_tool_message() {
        let msg = message::tool_message("call_123", "result data");
        let converted = OpenAiProvider::convert_message(&msg);
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_convert_assistant_with_tool_calls() {
        let msg = message::assistant_tool_calls_message(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "calculator".to_string(),
                arguments: "{}".to_string(),
            }],
        );
        let converted = OpenAiProvider::convert_message(&msg);
        if let ChatCompletionRequestMessage::Assistant(a) = converted {
            assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
            assert!(a.content.is_none());
        } else {
            panic!("Expected Assistant message");
        }
    }

    #[test]
    fn test_build_request_binds_tools_when_supported() {
        let built = provider(true).build_request(&request_with_tool());
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
    }

    #[test]
    fn test_build_request_drops_tools_when_unsupported() {
        let built = provider(false).build_request(&request_with_tool());
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_build_request_streaming() {
        let mut request = request_with_tool();
        request.stream = true;
        let built = provider(true).build_request(&request);
        assert_eq!(built.stream, Some(true));
    }

    #[test]
    fn test_convert_tool_chunk_filters_empty_header() {
        let chunk = ChatCompletionMessageToolCallChunk {
            index: 1,
            id: Some(String::new()),
            r#type: None,
            function: Some(FunctionCallStream {
                name: None,
                arguments: Some("{\"a\"".to_string()),
            }),
        };
        let converted = OpenAiProvider::convert_tool_chunk(&chunk);
        assert_eq!(converted.index, 1);
        assert!(converted.id.is_none());
        assert!(converted.name.is_none());
        assert_eq!(converted.arguments, "{\"a\"");
    }

    #[test]
    fn test_capability_flag() {
        assert!(provider(true).supports_tool_binding());
        assert!(!provider(false).supports_tool_binding());
    }
}
