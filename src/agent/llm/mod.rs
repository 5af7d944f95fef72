//! LLM client abstraction layer.
//!
//! This module provides:
//! - [`LlmClient`] trait for swappable LLM providers
//! - [`ProviderRegistry`] for creating a client from a [`ModelSpec`]
//! - Concrete implementations: Gemini, OpenAI-compatible (OpenAI and
//!   Ollama), Anthropic
//!
//! # Adding a New Provider
//!
//! 1. Create a new file (e.g., `mistral.rs`)
//! 2. Implement `LlmClient` trait
//! 3. Add a [`Provider`] variant and resolve it in `model.rs`
//! 4. Add to `ProviderRegistry::create()`

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::Error;
use crate::tools::ToolDefinition;
use crate::usage::Usage;
use crate::Result;

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use super::message::{Message, ToolCallRequest};
use super::model::{ModelSpec, Provider};

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Text content of the response.
    pub content: Option<String>,

    /// Tool calls requested by the LLM.
    pub tool_calls: Vec<ToolCallRequest>,

    /// Reason the response finished.
    pub finish_reason: String,

    /// Token usage of this single request.
    pub usage: Usage,
}

impl LlmResponse {
    /// Create a simple text response.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: vec![],
            finish_reason: "stop".to_string(),
            usage: Usage::request(0, 0, 0),
        }
    }

    /// Check if response has tool calls.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// LLM client trait - swappable provider abstraction.
///
/// Implement this trait to add a new LLM provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send messages and get response.
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse>;

    /// Get the model this client talks to.
    fn default_model(&self) -> &str;
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn chat(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<LlmResponse> {
        (**self).chat(messages, tools).await
    }

    fn default_model(&self) -> &str {
        (**self).default_model()
    }
}

/// Provider registry - creates LLM clients dynamically.
///
/// # Example
///
/// ```ignore
/// let spec = ModelSpec::parse("gpt-5-mini")?;
/// let client = ProviderRegistry::create(&spec, &config.providers)?;
/// let response = client.chat(&messages, &tools).await?;
/// ```
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Create an LLM client for a resolved model. Missing credentials are
    /// reported as [`Error::Config`].
    pub fn create(spec: &ModelSpec, providers: &ProviderConfig) -> Result<Box<dyn LlmClient>> {
        match spec.provider {
            Provider::Gemini => {
                require(&providers.gemini_api_key, "GEMINI_API_KEY (or GOOGLE_API_KEY)")?;
                Ok(Box::new(GeminiClient::new(&providers.gemini_api_key, &spec.model)))
            }
            Provider::OpenAi => {
                require(&providers.openai_api_key, "OPENAI_API_KEY")?;
                let base_url = providers
                    .openai_base_url
                    .as_deref()
                    .unwrap_or(openai::OPENAI_API_URL);
                Ok(Box::new(OpenAiClient::new(
                    base_url,
                    Some(providers.openai_api_key.clone()),
                    &spec.model,
                )))
            }
            Provider::Anthropic => {
                require(&providers.anthropic_api_key, "ANTHROPIC_API_KEY")?;
                Ok(Box::new(AnthropicClient::new(
                    &providers.anthropic_api_key,
                    &spec.model,
                )))
            }
            Provider::Ollama => {
                let base_url = providers.ollama_base_url.as_deref().ok_or_else(|| {
                    Error::Config("Set OLLAMA_BASE_URL to http://1.2.3.4:11434/v1".to_string())
                })?;
                Ok(Box::new(OpenAiClient::new(base_url, None, &spec.model)))
            }
        }
    }
}

fn require(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{name} is not set")));
    }
    Ok(())
}

/// Fake LLM client for testing.
#[cfg(test)]
pub struct FakeLlmClient {
    responses: std::sync::Mutex<std::collections::VecDeque<Result<LlmResponse>>>,
    pub seen: std::sync::Mutex<Vec<Vec<Message>>>,
}

#[cfg(test)]
impl FakeLlmClient {
    /// Create with predefined text responses.
    pub fn new(responses: Vec<&str>) -> Self {
        Self::scripted(responses.into_iter().map(|s| Ok(LlmResponse::text(s))).collect())
    }

    /// Create from an arbitrary script of responses and errors.
    pub fn scripted(responses: Vec<Result<LlmResponse>>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into()),
            seen: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// A response asking for a single tool call.
    pub fn tool_call(name: &str, args: serde_json::Value) -> LlmResponse {
        LlmResponse {
            content: None,
            tool_calls: vec![ToolCallRequest {
                id: "tc_1".to_string(),
                name: name.to_string(),
                arguments: args,
            }],
            finish_reason: "tool_calls".to_string(),
            usage: Usage::request(10, 5, 15),
        }
    }

    /// Create with a single tool call followed by a text response.
    pub fn with_tool_call(name: &str, args: serde_json::Value, final_response: &str) -> Self {
        Self::scripted(vec![
            Ok(Self::tool_call(name, args)),
            Ok(LlmResponse::text(final_response)),
        ])
    }
}

#[cfg(test)]
#[async_trait]
impl LlmClient for FakeLlmClient {
    async fn chat(&self, messages: &[Message], _tools: &[ToolDefinition]) -> Result<LlmResponse> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        responses
            .pop_front()
            .unwrap_or_else(|| Err(Error::Llm("No more fake responses".to_string())))
    }

    fn default_model(&self) -> &str {
        "fake-model"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_llm_client() {
        let client = FakeLlmClient::new(vec!["Hello!", "World!"]);

        let resp1 = client.chat(&[], &[]).await.unwrap();
        assert_eq!(resp1.content.as_deref(), Some("Hello!"));

        let resp2 = client.chat(&[], &[]).await.unwrap();
        assert_eq!(resp2.content.as_deref(), Some("World!"));

        assert!(client.chat(&[], &[]).await.is_err());
    }

    #[test]
    fn test_registry_requires_credentials() {
        let providers = ProviderConfig::default();

        let err = ProviderRegistry::create(&ModelSpec::parse("gpt-5-mini").unwrap(), &providers)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("OPENAI_API_KEY")));

        let err = ProviderRegistry::create(&ModelSpec::parse("ollama:qwen3:14b").unwrap(), &providers)
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(ref m) if m.contains("OLLAMA_BASE_URL")));
    }

    #[test]
    fn test_registry_creates_clients() {
        let providers = ProviderConfig {
            gemini_api_key: "g".to_string(),
            openai_api_key: "o".to_string(),
            openai_base_url: None,
            anthropic_api_key: "a".to_string(),
            ollama_base_url: Some("http://localhost:11434/v1".to_string()),
        };

        for (name, model) in [
            ("gemini", "gemini-2.5-pro"),
            ("gpt-5-mini", "gpt-5-mini"),
            ("claude", "claude-sonnet-4-20250514"),
            ("ollama:qwen3:14b", "qwen3:14b"),
        ] {
            let client = ProviderRegistry::create(&ModelSpec::parse(name).unwrap(), &providers).unwrap();
            assert_eq!(client.default_model(), model);
        }
    }
}
