//! RelicSeek LLM Provider Layer
//!
//! Implementations of the `LanguageModel` port from `relicseek-domain`.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable mock for testing
//! - `OpenAiProvider`: Any OpenAI-compatible chat completions endpoint
//!   (OpenAI, vLLM, SiliconFlow, a local Qwen server, ...)
//!
//! # Examples
//!
//! ```
//! use relicseek_llm::MockProvider;
//! use relicseek_domain::traits::LanguageModel;
//!
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.complete("test prompt", "").unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod mock;
pub mod openai;

use relicseek_domain::ModelError;
use thiserror::Error;

pub use mock::MockProvider;
pub use openai::{OpenAiConfig, OpenAiProvider};

/// Errors raised while talking to an LLM backend
///
/// Converted into the domain's [`ModelError`] at the port boundary.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// The request did not finish in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Client could not be set up
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<LlmError> for ModelError {
    fn from(e: LlmError) -> Self {
        let message = e.to_string();
        match e {
            LlmError::Timeout(_) => ModelError::timeout(message),
            LlmError::RateLimitExceeded => ModelError::rate_limited(message),
            LlmError::InvalidResponse(_) => ModelError::invalid_response(message),
            LlmError::Communication(_) | LlmError::ModelNotAvailable(_) | LlmError::Config(_) => {
                ModelError::unavailable(message)
            }
        }
    }
}

impl From<std::io::Error> for LlmError {
    fn from(e: std::io::Error) -> Self {
        LlmError::Config(format!("Failed to start runtime: {}", e))
    }
}

/// Drive a future to completion from synchronous port code
///
/// Port methods are synchronous and the engine calls them from blocking
/// threads, where the ambient runtime handle can be used. Without a runtime a
/// throwaway current-thread runtime is built.
pub fn block_on<F: std::future::Future>(future: F) -> std::io::Result<F::Output> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(future)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
            Ok(runtime.block_on(future))
        }
    }
}
