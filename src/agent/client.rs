//! Provider registry and factory.
//!
//! Maps model families to concrete [`LlmProvider`] implementations. Each
//! provider is built once, so its tool-binding capability is fixed for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::ChatError;

/// Creates an [`LlmProvider`] for a model family.
///
/// # Supported Families
///
/// - `"openai"`: `OpenAI`-compatible APIs via `async-openai`, tools bound
/// - `"ollama"`: Ollama's `OpenAI`-compatible endpoint, text only
///
/// # Errors
///
/// Returns [`ChatError::UnsupportedProvider`] for unknown families.
pub fn create_provider(
    config: &AgentConfig,
    family: &str,
) -> Result<Arc<dyn LlmProvider>, ChatError> {
    match family {
        "openai" => Ok(Arc::new(OpenAiProvider::new(
            "openai",
            &config.api_key,
            config.base_url.as_deref(),
            true,
        ))),
        "ollama" => Ok(Arc::new(OpenAiProvider::new(
            "ollama",
            "ollama",
            Some(&config.ollama_base_url),
            false,
        ))),
        other => Err(ChatError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Providers keyed by model family.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderSet {
    /// Families built by [`ProviderSet::from_config`].
    pub const FAMILIES: [&'static str; 2] = ["openai", "ollama"];

    /// Builds a provider for every supported family.
    ///
    /// # Errors
    ///
    /// Propagates [`create_provider`] failures.
    pub fn from_config(config: &AgentConfig) -> Result<Self, ChatError> {
        let mut set = Self::default();
        for family in Self::FAMILIES {
            set = set.with(family, create_provider(config, family)?);
        }
        Ok(set)
    }

    /// Registers (or replaces) the provider for `family`.
    #[must_use]
    pub fn with(mut self, family: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(family.into(), provider);
        self
    }

    /// Resolves the provider for `family`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnsupportedProvider`] if no provider is registered.
    pub fn get(&self, family: &str) -> Result<Arc<dyn LlmProvider>, ChatError> {
        self.providers
            .get(family)
            .cloned()
            .ok_or_else(|| ChatError::UnsupportedProvider {
                name: family.to_string(),
            })
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        families.sort_unstable();
        f.debug_struct("ProviderSet")
            .field("families", &families)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AgentConfig {
        AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_create_openai_provider() {
        let provider = create_provider(&config(), "openai").unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "openai");
        assert!(provider.supports_tool_binding());
    }

    #[test]
    fn test_create_ollama_provider_without_tools() {
        let provider = create_provider(&config(), "ollama").unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "ollama");
        assert!(!provider.supports_tool_binding());
    }

    #[test]
    fn test_create_unknown_provider() {
        let result = create_provider(&config(), "unknown");
        assert!(matches!(result, Err(ChatError::UnsupportedProvider { .. })));
    }

    #[test]
    fn test_provider_set_lookup() {
        let set = ProviderSet::from_config(&config()).unwrap_or_else(|_| unreachable!());
        assert!(set.get("openai").is_ok());
        assert!(set.get("ollama").is_ok());
        assert!(set.get("anthropic").is_err());
    }
}
