//! OpenAI-compatible Provider Implementation
//!
//! Talks to any server exposing the `/chat/completions` API. Self-hosted
//! servers (vLLM, llama.cpp, Ollama's OpenAI shim) usually accept any key, so
//! a placeholder key is sent when none is configured.
//!
//! # Features
//!
//! - Async HTTP communication with a synchronous port wrapper
//! - Configurable endpoint, model, sampling and timeout
//! - Retry logic with exponential backoff for transient failures
//!
//! # Examples
//!
//! ```no_run
//! use relicseek_llm::{OpenAiConfig, OpenAiProvider};
//!
//! let config = OpenAiConfig {
//!     base_url: "http://localhost:8000/v1".to_string(),
//!     model: "Qwen3-32B".to_string(),
//!     ..Default::default()
//! };
//! let provider = OpenAiProvider::new(config).unwrap();
//! ```

use crate::{block_on, LlmError};
use relicseek_domain::traits::LanguageModel;
use relicseek_domain::ModelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model
pub const DEFAULT_MODEL: &str = "Qwen3-32B";

/// Default timeout for LLM requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Key sent to servers that need none
const PLACEHOLDER_API_KEY: &str = "sk-placeholder";

/// Connection and sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// API base URL, without the trailing `/chat/completions`
    pub base_url: String,

    /// API key (empty for servers that need none)
    pub api_key: String,

    /// Model id
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens per answer
    pub max_tokens: u32,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Attempts per request, including the first
    pub max_retries: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    /// Create a provider
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Config`] if the base URL is empty or the HTTP
    /// client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, LlmError> {
        if config.base_url.trim().is_empty() {
            return Err(LlmError::Config("base_url must not be empty".to_string()));
        }
        if config.max_retries == 0 {
            return Err(LlmError::Config("max_retries must be at least 1".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// The active configuration
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn api_key(&self) -> &str {
        if self.config.api_key.is_empty() {
            PLACEHOLDER_API_KEY
        } else {
            &self.config.api_key
        }
    }

    /// Send a chat completion request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The server is unreachable after all retries
    /// - The server keeps rate limiting
    /// - The model is not available
    /// - The response format is invalid
    pub async fn chat(&self, prompt: &str, context: &str, json_mode: bool) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if !context.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: context,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request_body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let url = self.endpoint();

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.config.max_retries {
            match self.send_once(&url, &request_body).await {
                Ok(content) => return Ok(content),
                Err(e @ (LlmError::InvalidResponse(_) | LlmError::ModelNotAvailable(_) | LlmError::Config(_))) => {
                    return Err(e);
                }
                Err(e) => {
                    warn!("LLM request attempt {} failed: {}", attempts + 1, e);
                    last_error = Some(e);
                }
            }

            attempts += 1;
            if attempts < self.config.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    async fn send_once(&self, url: &str, body: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(e.to_string())
                } else {
                    LlmError::Communication(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimitExceeded);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.config.model.clone()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Config(format!("HTTP {}: check the API key", status)));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("Response has no message content".to_string()))?;

        debug!("LLM response length: {} chars", content.len());
        Ok(strip_think_block(&content))
    }
}

/// Drop a leading `<think>...</think>` block emitted by reasoning models
fn strip_think_block(content: &str) -> String {
    let trimmed = content.trim_start();
    if let Some(rest) = trimmed.strip_prefix("<think>") {
        if let Some(end) = rest.find("</think>") {
            return rest[end + "</think>".len()..].trim().to_string();
        }
    }
    content.trim().to_string()
}

impl LanguageModel for OpenAiProvider {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn complete(&self, prompt: &str, context: &str) -> Result<String, ModelError> {
        block_on(self.chat(prompt, context, false)).map_err(LlmError::from)?.map_err(ModelError::from)
    }

    fn complete_structured(&self, prompt: &str, context: &str, schema: &str) -> Result<String, ModelError> {
        let prompt = format!("{}\n\nRespond with JSON matching this schema:\n{}", prompt, schema);
        block_on(self.chat(&prompt, context, true)).map_err(LlmError::from)?.map_err(ModelError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicseek_domain::ModelErrorReason;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new(OpenAiConfig::default()).unwrap();
        assert_eq!(provider.name(), DEFAULT_MODEL);
        assert_eq!(provider.endpoint(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(provider.api_key(), PLACEHOLDER_API_KEY);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = OpenAiConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            api_key: "sk-test".to_string(),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(config).unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8000/v1/chat/completions");
        assert_eq!(provider.api_key(), "sk-test");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = OpenAiConfig {
            base_url: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(OpenAiProvider::new(config), Err(LlmError::Config(_))));

        let config = OpenAiConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(OpenAiProvider::new(config).is_err());
    }

    #[test]
    fn test_strip_think_block() {
        assert_eq!(strip_think_block("<think>hmm</think>\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_think_block("  plain answer "), "plain answer");
        assert_eq!(strip_think_block("<think>unterminated"), "<think>unterminated");
    }

    #[test]
    fn test_config_toml_defaults() {
        let config: OpenAiConfig = serde_json::from_str(r#"{"model":"gpt-4o-mini"}"#).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_unreachable_endpoint() {
        // Port 9 (discard) is closed on test machines
        let config = OpenAiConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            max_retries: 1,
            timeout_secs: 2,
            ..Default::default()
        };
        let provider = OpenAiProvider::new(config).unwrap();
        let err = provider.complete("hello", "").unwrap_err();
        assert!(matches!(err.reason, ModelErrorReason::Unavailable | ModelErrorReason::Timeout));
    }

    // Integration test (requires a running OpenAI-compatible server)
    #[tokio::test]
    #[ignore]
    async fn test_chat_integration() {
        let config = OpenAiConfig {
            base_url: "http://localhost:8000/v1".to_string(),
            ..Default::default()
        };
        let provider = OpenAiProvider::new(config).unwrap();
        if let Ok(response) = provider.chat("Say 'hello' and nothing else", "", false).await {
            assert!(!response.is_empty());
        }
    }
}
