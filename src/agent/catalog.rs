//! Per-request tool catalog.
//!
//! Merges the built-in [`Calculator`] with the tools listed by the registry
//! session, producing model-facing schemas and a name → tool lookup.
//! Names must be unique; a clash is a request error rather than a silent
//! overwrite.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::calculator::Calculator;
use super::registry::{ToolRegistry, ToolSession};
use super::tool::{ToolCall, ToolDefinition, ToolResult};
use crate::error::ChatError;

/// An invocable tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Schema exposed to the model.
    fn definition(&self) -> &ToolDefinition;

    /// Runs the tool with structured arguments.
    async fn invoke(&self, arguments: Value) -> Result<Value, ChatError>;
}

/// A registry tool; invocation forwards to the session that listed it.
pub struct RegistryTool {
    definition: ToolDefinition,
    session: Arc<dyn ToolSession>,
}

impl RegistryTool {
    /// Wraps a listed definition.
    #[must_use]
    pub fn new(definition: ToolDefinition, session: Arc<dyn ToolSession>) -> Self {
        Self {
            definition,
            session,
        }
    }
}

#[async_trait]
impl Tool for RegistryTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn invoke(&self, arguments: Value) -> Result<Value, ChatError> {
        self.session
            .call_tool(&self.definition.name, arguments)
            .await
            .map_err(|e| ChatError::ToolExecution {
                name: self.definition.name.clone(),
                message: e.to_string(),
            })
    }
}

/// Tools available to the model for one request.
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolCatalog {
    /// Builds a catalog from explicit tools.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] if two tools share a name.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, ChatError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (idx, tool) in tools.iter().enumerate() {
            let name = tool.definition().name.clone();
            if by_name.insert(name.clone(), idx).is_some() {
                return Err(ChatError::invalid(format!("duplicate tool name '{name}'")));
            }
        }
        Ok(Self { tools, by_name })
    }

    /// Builds the request catalog: calculator plus everything the registry
    /// lists right now.
    ///
    /// # Errors
    ///
    /// Propagates registry failures and duplicate-name errors.
    pub async fn build(registry: &dyn ToolRegistry) -> Result<Self, ChatError> {
        let session = registry.connect().await?;
        let listed = session.list_tools().await?;
        debug!(external = listed.len(), "tool registry listed tools");

        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(listed.len() + 1);
        tools.push(Arc::new(Calculator::new()));
        tools.extend(
            listed
                .into_iter()
                .map(|def| Arc::new(RegistryTool::new(def, Arc::clone(&session))) as Arc<dyn Tool>),
        );
        Self::new(tools)
    }

    /// Schemas for binding to the model, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition().clone()).collect()
    }

    /// Looks up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| Arc::clone(&self.tools[idx]))
    }

    /// Number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if the catalog holds no tools.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Resolves and runs a completed tool call.
    ///
    /// Returns `Ok(None)` when no tool has the requested name.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ToolExecution`] if the arguments do not parse
    /// or the tool fails.
    pub async fn execute(&self, call: &ToolCall) -> Result<Option<ToolResult>, ChatError> {
        let Some(tool) = self.get(&call.name) else {
            return Ok(None);
        };
        let arguments = call.parse_arguments()?;
        let content = tool.invoke(arguments).await?;
        Ok(Some(ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
        }))
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self
            .tools
            .iter()
            .map(|t| t.definition().name.as_str())
            .collect();
        f.debug_struct("ToolCatalog").field("tools", &names).finish()
    }
}
