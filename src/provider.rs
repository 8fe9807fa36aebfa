//! AI Backend Abstraction
//!
//! The execution core only needs one capability from a generative model:
//! `generate(text, model) -> text`. [`AiBackend`] is that seam. The bundled
//! [`ChatCompletionsBackend`] speaks the OpenAI-compatible chat-completions
//! protocol, which covers OpenAI, OpenRouter, Ollama and local servers.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Text generation capability used by batch items and text cleanup.
///
/// Implementations may be slow and may fail; callers never retry.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Send `text` as a single user message to `model` and return the reply.
    async fn generate(&self, text: &str, model: &str) -> Result<String, ApiError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Supported provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    OpenAI,
    OpenRouter,
    Ollama,
    Custom,
}

impl ProviderType {
    pub fn slug(self) -> &'static str {
        match self {
            ProviderType::OpenAI => "openai",
            ProviderType::OpenRouter => "openrouter",
            ProviderType::Ollama => "ollama",
            ProviderType::Custom => "custom",
        }
    }

    /// Base URL used when the configuration does not name an endpoint.
    pub fn default_endpoint(self) -> Option<&'static str> {
        match self {
            ProviderType::OpenAI => Some("https://api.openai.com/v1"),
            ProviderType::OpenRouter => Some("https://openrouter.ai/api/v1"),
            ProviderType::Ollama => Some("http://localhost:11434/v1"),
            ProviderType::Custom => None,
        }
    }

    fn requires_api_key(self) -> bool {
        matches!(self, ProviderType::OpenAI | ProviderType::OpenRouter)
    }
}

/// Completion options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub temperature: Option<f32>, // 0.0-2.0
    pub max_tokens: Option<u32>,  // Maximum tokens to generate
    pub top_p: Option<f32>,       // Nucleus sampling
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.3),
            max_tokens: None,
            top_p: None,
        }
    }
}

/// Provider section of the application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,

    /// Model passed to every generate call
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub default_options: CompletionOptions,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::Ollama,
            model: "llama3".to_string(),
            api_key: None,
            endpoint: None,
            default_options: CompletionOptions::default(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("Model name cannot be empty".to_string());
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(format!(
                    "Endpoint must start with http:// or https://, got '{}'",
                    endpoint
                ));
            }
        } else if self.provider_type.default_endpoint().is_none() {
            return Err(format!(
                "Provider type '{}' requires an endpoint",
                self.provider_type.slug()
            ));
        }

        if self.provider_type.requires_api_key()
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(format!(
                "Provider type '{}' requires an api_key",
                self.provider_type.slug()
            ));
        }

        Ok(())
    }

    pub fn resolved_endpoint(&self) -> Result<String, ApiError> {
        self.endpoint
            .clone()
            .or_else(|| self.provider_type.default_endpoint().map(str::to_string))
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                ApiError::ProviderNotConfigured(format!(
                    "no endpoint for provider type '{}'",
                    self.provider_type.slug()
                ))
            })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// Helper function to map HTTP errors to ApiError
fn map_http_error(error: reqwest::Error) -> ApiError {
    if let Some(status) = error.status() {
        map_status(status.as_u16(), &error.to_string())
    } else if error.is_timeout() {
        ApiError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        ApiError::ProviderError(format!("HTTP error: {}", error))
    }
}

fn map_status(status: u16, detail: &str) -> ApiError {
    match status {
        401 | 403 => ApiError::ProviderAuthFailed(format!("Authentication failed: {}", detail)),
        404 => ApiError::ProviderModelNotFound(format!("Model not found: {}", detail)),
        429 => ApiError::ProviderRateLimit(format!("Rate limit exceeded: {}", detail)),
        _ => ApiError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, detail
        )),
    }
}

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROVIDER_HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn build_provider_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(PROVIDER_HTTP_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ApiError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

/// OpenAI-compatible chat-completions backend
pub struct ChatCompletionsBackend {
    client: Client,
    provider_type: ProviderType,
    base_url: String,
    api_key: Option<String>,
    options: CompletionOptions,
}

impl ChatCompletionsBackend {
    pub fn new(config: &ProviderConfig) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_provider_http_client()?,
            provider_type: config.provider_type,
            base_url: config.resolved_endpoint()?,
            api_key: config.api_key.clone(),
            options: config.default_options.clone(),
        })
    }
}

#[async_trait]
impl AiBackend for ChatCompletionsBackend {
    async fn generate(&self, text: &str, model: &str) -> Result<String, ApiError> {
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: text,
            }],
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            top_p: self.options.top_p,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            provider = self.provider_type.slug(),
            model,
            prompt_chars = text.chars().count(),
            "Sending chat completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(map_status(status.as_u16(), &error_text));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ApiError::ProviderError(format!("Failed to parse response: {}", e)))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ApiError::ProviderError("No content in response".to_string()))?;

        Ok(content.trim().to_string())
    }

    fn provider_name(&self) -> &str {
        self.provider_type.slug()
    }
}

/// Build the configured backend.
pub fn backend_from_config(config: &ProviderConfig) -> Result<Arc<dyn AiBackend>, ApiError> {
    config
        .validate()
        .map_err(ApiError::ProviderNotConfigured)?;
    Ok(Arc::new(ChatCompletionsBackend::new(config)?))
}

// Mock backend for unit tests
#[cfg(test)]
pub struct MockBackend {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, ApiError>>>,
    prompts: parking_lot::Mutex<Vec<(String, String)>>,
}

#[cfg(test)]
impl MockBackend {
    pub fn new(responses: Vec<Result<String, ApiError>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into()),
            prompts: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// (text, model) pairs in call order
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl AiBackend for MockBackend {
    async fn generate(&self, text: &str, model: &str) -> Result<String, ApiError> {
        self.prompts.lock().push((text.to_string(), model.to_string()));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("Mock response".to_string()))
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
