//! External tool registry seam.
//!
//! The registry is reached through a session opened once per request and
//! dropped when the request finishes, so no connection outlives the
//! request that opened it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::tool::ToolDefinition;
use crate::error::ChatError;

/// A source of externally executed tools.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Opens a request-scoped session.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ToolRegistry`] if the registry is unreachable.
    async fn connect(&self) -> Result<Arc<dyn ToolSession>, ChatError>;
}

/// A live connection to a tool registry.
#[async_trait]
pub trait ToolSession: Send + Sync {
    /// Lists the tools currently offered.
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError>;

    /// Invokes `name` with structured arguments and returns its raw result.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ChatError>;
}

/// Registry that offers no tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyToolRegistry;

#[async_trait]
impl ToolRegistry for EmptyToolRegistry {
    async fn connect(&self) -> Result<Arc<dyn ToolSession>, ChatError> {
        Ok(Arc::new(Self))
    }
}

#[async_trait]
impl ToolSession for EmptyToolRegistry {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>, ChatError> {
        Ok(Vec::new())
    }

    async fn call_tool(&self, name: &str, _arguments: Value) -> Result<Value, ChatError> {
        Err(ChatError::ToolRegistry {
            message: format!("no external tool named '{name}'"),
        })
    }
}
