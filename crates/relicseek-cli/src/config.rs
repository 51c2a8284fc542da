//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use relicseek_engine::SessionConfig;
use relicseek_llm::OpenAiConfig;
use relicseek_search::{FetchConfig, SearxngConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the model API key
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the model endpoint
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";
/// Environment variable overriding the SearXNG address
pub const ENV_SEARXNG_URL: &str = "SEARXNG_URL";

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory with prompt template overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,

    /// Language model endpoint
    #[serde(default)]
    pub model: OpenAiConfig,

    /// Search aggregator
    #[serde(default)]
    pub searxng: SearxngConfig,

    /// Page fetching
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Research session defaults
    #[serde(default)]
    pub session: SessionConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (`RUST_LOG` takes precedence)
    #[serde(default = "default_level")]
    pub level: String,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Command history size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (report only) format
    Quiet,
}

impl AppConfig {
    /// Get the default configuration directory.
    pub fn dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".relicseek"))
    }

    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::dir()?.join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default one.
    pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::path(),
        }
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    ///
    /// Environment overrides are not applied; see [`AppConfig::apply_env`].
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Apply `OPENAI_API_KEY`, `OPENAI_API_BASE` and `SEARXNG_URL`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from any variable source.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.model.api_key = key;
        }
        if let Some(base) = non_empty(ENV_API_BASE) {
            self.model.base_url = base;
        }
        if let Some(url) = non_empty(ENV_SEARXNG_URL) {
            self.searxng.base_url = url;
        }
    }

    /// Copy for display, with the API key masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.model.api_key = mask_secret(&copy.model.api_key);
        copy
    }
}

/// Keep the first and last few characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            history_size: 1000,
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_history_size() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "warn");
        assert!(config.settings.color);
        assert_eq!(config.settings.format, OutputFormat::Table);
        assert_eq!(config.session, SessionConfig::default());
        assert!(config.prompts_dir.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = AppConfig::from_toml(
            r#"
prompts_dir = "/etc/relicseek/prompts"

[model]
model = "qwen-max"

[session]
verification_rounds = 2

[settings]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.model.model, "qwen-max");
        assert_eq!(config.model.max_tokens, OpenAiConfig::default().max_tokens);
        assert_eq!(config.session.verification_rounds, 2);
        assert_eq!(config.session.max_iterations, SessionConfig::default().max_iterations);
        assert_eq!(config.settings.format, OutputFormat::Json);
        assert!(config.settings.color);
        assert_eq!(config.prompts_dir, Some(PathBuf::from("/etc/relicseek/prompts")));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.searxng.base_url = "http://searx.local:8080".to_string();
        config.session.quality_threshold = 0.8;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[session\nmax_iterations = ").unwrap();
        assert!(matches!(AppConfig::load_from(&path), Err(CliError::Toml(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_API_KEY, "sk-test-123456789"),
            (ENV_API_BASE, "http://localhost:8000/v1"),
            (ENV_SEARXNG_URL, "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.model.api_key, "sk-test-123456789");
        assert_eq!(config.model.base_url, "http://localhost:8000/v1");
        assert_eq!(config.searxng.base_url, SearxngConfig::default().base_url);
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret("sk-abcdefghijkl"), "sk-...ijkl");

        let mut config = AppConfig::default();
        config.model.api_key = "sk-abcdefghijkl".to_string();
        assert_eq!(config.redacted().model.api_key, "sk-...ijkl");
    }
}
