//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid research session settings
    #[error("Session configuration error: {0}")]
    Session(#[from] relicseek_engine::ConfigError),

    /// Prompt template could not be loaded
    #[error("Prompt error: {0}")]
    Prompt(#[from] relicseek_engine::PromptError),

    /// A port backend could not be set up
    #[error("Setup error: {0}")]
    Setup(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nothing to act on yet
    #[error("No research result yet. Run a query first.")]
    NoResult,
}

impl From<relicseek_llm::LlmError> for CliError {
    fn from(e: relicseek_llm::LlmError) -> Self {
        CliError::Setup(format!("language model: {}", e))
    }
}

impl From<relicseek_domain::SearchError> for CliError {
    fn from(e: relicseek_domain::SearchError) -> Self {
        CliError::Setup(format!("search: {}", e))
    }
}

impl From<relicseek_domain::FetchError> for CliError {
    fn from(e: relicseek_domain::FetchError) -> Self {
        CliError::Setup(format!("fetcher: {}", e))
    }
}
