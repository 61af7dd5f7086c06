//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the text generation backends:
//! - **OpenAI**: OpenAI API and compatible endpoints, with streaming
//! - **Ollama**: Local LLM inference with streaming

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LlmConfig, LlmProviderKind};
use async_trait::async_trait;

/// Incremental text fragments produced by a streaming generation call.
pub type TokenStream = Box<dyn futures::Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
///
/// All LLM providers implement this trait, allowing for easy swapping
/// between providers without changing pipeline code.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Stream a completion with system prompt
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TokenStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     temperature: 0.7,
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        temperature: f32,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.2".to_string(),
    ///     temperature: 0.7,
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        temperature: f32,
    },
}

impl Provider {
    /// Resolve the provider described by the `[llm]` config section
    ///
    /// The API key, when one is required, is read from the environment
    /// variable named by `api_key_env`.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        match config.provider {
            LlmProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: config.base_url.clone(),
                model: config.model.clone(),
                temperature: config.temperature,
            }),
            LlmProviderKind::OpenAI => {
                let env = config.api_key_env.as_deref().ok_or_else(|| {
                    AppError::Config("llm.api_key_env is not set".to_string())
                })?;
                let api_key = std::env::var(env)
                    .map_err(|_| AppError::Config(format!("Environment variable '{}' is not set", env)))?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: config.base_url.clone(),
                    model: config.model.clone(),
                    temperature: config.temperature,
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's Cargo feature is disabled or the
    /// client cannot be constructed.
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                temperature,
            } => Ok(Box::new(
                super::openai::OpenAIClient::new(api_key.clone(), api_base.clone(), model.clone())
                    .with_temperature(*temperature),
            )),

            #[cfg(not(feature = "openai"))]
            Provider::OpenAI { .. } => Err(AppError::Config(
                "OpenAI provider requires the 'openai' feature".to_string(),
            )),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                temperature,
            } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone())
                    .await?
                    .with_temperature(*temperature),
            )),

            #[cfg(not(feature = "ollama"))]
            Provider::Ollama { .. } => Err(AppError::Config(
                "Ollama provider requires the 'ollama' feature".to_string(),
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}
