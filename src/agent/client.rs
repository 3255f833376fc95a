//! Chat client for hosted and local language models.
//!
//! Two wire formats are supported: the OpenAI-compatible
//! `/chat/completions` endpoint and Ollama's `/api/chat`. Only plain,
//! non-streaming chat is used.

use crate::chart::ChartError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while talking to the model or acting on its reply.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No API key configured for provider {0} (set PANDASAI_API_KEY or --api-key)")]
    MissingApiKey(Provider),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Failed to parse model response: {0}")]
    Decode(String),

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Chart(#[from] ChartError),
}

impl AgentError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Timeout(_) | AgentError::Connect(_) => true,
            AgentError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Supported model providers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI or any OpenAI-compatible endpoint (default)
    #[default]
    Openai,
    /// Local Ollama server
    Ollama,
}

impl Provider {
    pub fn default_url(&self) -> &'static str {
        match self {
            Provider::Openai => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434",
        }
    }

    fn requires_key(&self) -> bool {
        matches!(self, Provider::Openai)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Openai => write!(f, "openai"),
            Provider::Ollama => write!(f, "ollama"),
        }
    }
}

/// Configuration for the chat client.
#[derive(Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub retries: usize,
}

// The key is never printed.
impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retries", &self.retries)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            base_url: Provider::Openai.default_url().to_string(),
            model_name: "gpt-3.5-turbo".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_seconds: 120,
            retries: 2,
        }
    }
}

/// Message in a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// OpenAI chat completions request.
#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Non-streaming chat client with retry on transient failures.
pub struct LlmClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl LlmClient {
    /// Create a client. Fails when the provider needs a key and none is set.
    pub fn new(config: ClientConfig) -> Result<Self, AgentError> {
        if config.provider.requires_key()
            && config.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(AgentError::MissingApiKey(config.provider));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::Http(e.to_string()))?;

        info!(
            "Initialized {} client for model {} at {}",
            config.provider, config.model_name, config.base_url
        );

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.provider {
            Provider::Openai => format!("{}/chat/completions", base),
            Provider::Ollama => format!("{}/api/chat", base),
        }
    }

    /// Send a conversation and return the assistant's reply text.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let mut attempt = 0;
        loop {
            match self.send_once(messages).await {
                Ok(content) => return Ok(content),
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = Duration::from_secs(2 * attempt as u64);
                    warn!(
                        "{} (attempt {}/{}), retrying in {}s",
                        e,
                        attempt,
                        self.config.retries + 1,
                        delay.as_secs()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        let url = self.endpoint();
        debug!("Sending chat request with {} messages to {}", messages.len(), url);

        let request = match self.config.provider {
            Provider::Openai => {
                let body = OpenAiChatRequest {
                    model: &self.config.model_name,
                    messages,
                    temperature: self.config.temperature,
                };
                let mut request = self.http_client.post(&url).json(&body);
                if let Some(ref key) = self.config.api_key {
                    request = request.bearer_auth(key);
                }
                request
            }
            Provider::Ollama => {
                let body = OllamaChatRequest {
                    model: &self.config.model_name,
                    messages,
                    stream: false,
                    options: OllamaOptions {
                        temperature: self.config.temperature,
                    },
                };
                self.http_client.post(&url).json(&body)
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::Timeout(self.config.timeout_seconds)
            } else if e.is_connect() {
                AgentError::Connect(self.config.base_url.clone())
            } else {
                AgentError::Http(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                provider: self.config.provider,
                status,
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Http(e.to_string()))?;

        extract_content(self.config.provider, &body)
    }
}

/// Pull the assistant text out of a raw response body.
fn extract_content(provider: Provider, body: &str) -> Result<String, AgentError> {
    let content = match provider {
        Provider::Openai => {
            let parsed: OpenAiChatResponse =
                serde_json::from_str(body).map_err(|e| AgentError::Decode(e.to_string()))?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
        }
        Provider::Ollama => {
            let parsed: OllamaChatResponse =
                serde_json::from_str(body).map_err(|e| AgentError::Decode(e.to_string()))?;
            parsed.message.content
        }
    };

    match content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(AgentError::EmptyResponse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key() {
        let config = ClientConfig::default();
        assert!(matches!(
            LlmClient::new(config),
            Err(AgentError::MissingApiKey(Provider::Openai))
        ));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = ClientConfig {
            provider: Provider::Ollama,
            base_url: Provider::Ollama.default_url().to_string(),
            ..Default::default()
        };
        let client = LlmClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/chat");
    }

    #[test]
    fn test_openai_endpoint_trims_slash() {
        let config = ClientConfig {
            base_url: "https://example.test/v1/".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = LlmClient::new(config).unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1/chat/completions");
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig {
            api_key: Some("sk-secret-value".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret-value"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_extract_openai_content() {
        let body = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"There are 6131 movies."}}]}"#;
        assert_eq!(
            extract_content(Provider::Openai, body).unwrap(),
            "There are 6131 movies."
        );
    }

    #[test]
    fn test_extract_ollama_content() {
        let body = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Hello"},"done":true}"#;
        assert_eq!(extract_content(Provider::Ollama, body).unwrap(), "Hello");
    }

    #[test]
    fn test_extract_empty_and_invalid() {
        assert!(matches!(
            extract_content(Provider::Openai, r#"{"choices":[]}"#),
            Err(AgentError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(Provider::Ollama, "not json"),
            Err(AgentError::Decode(_))
        ));
    }

    #[test]
    fn test_transient_errors() {
        assert!(AgentError::Timeout(30).is_transient());
        assert!(AgentError::Api {
            provider: Provider::Openai,
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(!AgentError::Api {
            provider: Provider::Openai,
            status: 401,
            body: String::new()
        }
        .is_transient());
        assert!(!AgentError::EmptyResponse.is_transient());
    }
}
