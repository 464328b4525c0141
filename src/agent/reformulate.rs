//! Query reformulation agent.
//!
//! Rewrites the latest question into a standalone one using the
//! conversation so far. Reformulation is a soft dependency: any failure or
//! an empty answer falls back to the caller's literal question.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::message::{ChatMessage, Role};
use super::provider::LlmProvider;
use super::traits::Agent;

/// Agent that condenses history + question into a standalone query.
pub struct QueryReformulator {
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl QueryReformulator {
    /// Creates a reformulator for `model` with the given system prompt.
    #[must_use]
    pub fn new(model: impl Into<String>, max_tokens: u32, system_prompt: String) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            system_prompt,
        }
    }

    /// Returns a standalone version of `query`.
    ///
    /// With no prior user or assistant turns the query is returned without
    /// calling the model.
    pub async fn reformulate(
        &self,
        provider: &dyn LlmProvider,
        query: &str,
        history: &[ChatMessage],
    ) -> String {
        let dialogue: Vec<ChatMessage> = history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .cloned()
            .collect();
        if dialogue.is_empty() {
            return query.to_string();
        }

        match self.execute(provider, &dialogue, query).await {
            Ok(response) => {
                let standalone = response.content.trim();
                if standalone.is_empty() {
                    warn!("reformulation returned empty text, using original query");
                    query.to_string()
                } else {
                    debug!(original = query, standalone, "query reformulated");
                    standalone.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "reformulation failed, using original query");
                query.to_string()
            }
        }
    }
}

#[async_trait]
impl Agent for QueryReformulator {
    fn name(&self) -> &'static str {
        "reformulator"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}
