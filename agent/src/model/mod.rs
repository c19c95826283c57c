//! Model backends
//!
//! Direct HTTP client for OpenAI-compatible chat completion APIs.
//! Ollama exposes the same surface under `/v1`, so one wire format
//! covers both platforms.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

mod types;
pub use types::{
    ChatCompletion, ChatMessage, ChatRequest, Choice, FunctionCall, FunctionSpec, ToolCall,
    ToolSpec,
};

/// Anything that can answer a chat completion request.
///
/// The agent loop only talks to this trait; production uses
/// [`ModelBackend`], tests drive the loop with scripted models.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name, for logging
    fn model(&self) -> &str;

    /// Run one chat completion round
    async fn chat(&self, messages: Vec<ChatMessage>, tools: Vec<ToolSpec>)
        -> Result<ChatCompletion>;
}

/// Which API platform a model runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelPlatform {
    /// api.openai.com, bearer auth from `OPENAI_API_KEY`
    Openai,
    /// Any OpenAI-compatible endpoint with an explicit base url
    OpenaiCompatible,
    /// Local Ollama under /v1, no auth
    Ollama,
}

impl ModelPlatform {
    /// Default base url for the platform
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com/v1",
            Self::OpenaiCompatible => "http://localhost:8000/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

/// Configuration for creating a model backend
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub platform: ModelPlatform,
    pub model: String,
    /// Overrides the platform default when set
    pub base_url: Option<String>,
    /// Overrides `OPENAI_API_KEY` when set
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Streaming is not supported by the agent loop; kept explicit so the
    /// request always carries `"stream": false`
    pub stream: bool,
}

impl ModelConfig {
    pub fn new(platform: ModelPlatform, model: impl Into<String>) -> Self {
        Self {
            platform,
            model: model.into(),
            base_url: None,
            api_key: None,
            temperature: None,
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Factory for model backends
pub struct ModelFactory;

impl ModelFactory {
    /// Validate the configuration and build a backend
    pub fn create(config: ModelConfig) -> Result<ModelBackend> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.platform.default_base_url().to_string());

        let parsed = url::Url::parse(&base_url)
            .map_err(|_| AgentError::InvalidUrl(base_url.clone()))?;
        let base_url = parsed.as_str().trim_end_matches('/').to_string();

        let api_key = config.api_key.clone().or_else(|| {
            if config.platform == ModelPlatform::Openai {
                std::env::var("OPENAI_API_KEY").ok()
            } else {
                None
            }
        });

        Ok(ModelBackend {
            http_client: reqwest::Client::new(),
            base_url,
            api_key,
            config,
        })
    }
}

/// An OpenAI-compatible chat completion backend
pub struct ModelBackend {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    config: ModelConfig,
}

impl ModelBackend {
    /// Resolved base url
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatModel for ModelBackend {
    fn model(&self) -> &str {
        &self.config.model
    }

    /// Run one chat completion round. No streaming.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolSpec>,
    ) -> Result<ChatCompletion> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            tools: if tools.is_empty() { None } else { Some(tools) },
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream: self.config.stream,
        };

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            tools = request.tools.as_ref().map_or(0, |t| t.len()),
            "Sending chat completion request"
        );

        let start = Instant::now();
        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::ModelApi { status, body });
        }

        let completion: ChatCompletion = response.json().await?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );

        if completion.choices.is_empty() {
            return Err(AgentError::Model("response contained no choices".into()));
        }

        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_defaults() {
        assert!(ModelPlatform::Openai.default_base_url().contains("openai"));
        assert!(ModelPlatform::Ollama.default_base_url().contains("11434"));
    }

    #[test]
    fn test_factory_rejects_bad_url() {
        let config =
            ModelConfig::new(ModelPlatform::OpenaiCompatible, "test").with_base_url("not a url");
        assert!(ModelFactory::create(config).is_err());
    }

    #[test]
    fn test_factory_trims_trailing_slash() {
        let config = ModelConfig::new(ModelPlatform::Ollama, "qwen3:14b")
            .with_base_url("http://localhost:11434/v1/");
        let backend = ModelFactory::create(config).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:11434/v1");
    }
}
