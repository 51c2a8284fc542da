//! Configuration for a research session

use crate::error::ConfigError;
use relicseek_domain::SynonymTable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on `verification_rounds` and `max_iterations`
pub const MAX_ROUNDS: u32 = 10;

/// Settings for one research session
///
/// Validated once when the session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard cap on rounds
    pub max_iterations: u32,

    /// Rounds after which the session stops even if evidence is insufficient
    pub verification_rounds: u32,

    /// Wall-clock budget for the whole session (seconds)
    pub max_execution_time_secs: u64,

    /// Past verdicts shown to the model when it reflects
    pub memory_window_size: usize,

    /// Hits requested per search step, and fetched per step
    pub max_results_per_query: usize,

    /// Aggregate credibility needed before a "sufficient" verdict is accepted
    pub quality_threshold: f64,

    /// Bound on every single port call (seconds)
    pub timeout_secs: u64,

    /// Page fetches and extractions in flight at once
    pub max_concurrent_fetches: usize,

    /// Related terms added to each round-1 step
    pub max_related_terms: usize,

    /// Word added to broad searches to keep them on cultural relics
    pub topic_hint: String,

    /// Search categories
    pub categories: Vec<String>,

    /// Search engines
    pub engines: Vec<String>,

    /// Search language
    pub language: String,

    /// Extra synonym groups, on top of the built-in ones
    pub synonyms: Vec<Vec<String>>,
}

impl SessionConfig {
    /// Number of rounds the session may run
    pub fn round_limit(&self) -> u32 {
        self.verification_rounds.min(self.max_iterations)
    }

    /// Per-call timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Session budget as a Duration
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_secs(self.max_execution_time_secs)
    }

    /// Built-in synonyms plus the configured extra groups
    pub fn synonym_table(&self) -> SynonymTable {
        let mut table = SynonymTable::builtin();
        for group in &self.synonyms {
            table.add_group(group);
        }
        table
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verification_rounds == 0 {
            return Err(ConfigError::invalid("verification_rounds", "must be at least 1"));
        }
        if self.verification_rounds > MAX_ROUNDS {
            return Err(ConfigError::invalid(
                "verification_rounds",
                format!("must be at most {}", MAX_ROUNDS),
            ));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::invalid("max_iterations", "must be at least 1"));
        }
        if self.max_iterations > MAX_ROUNDS {
            return Err(ConfigError::invalid("max_iterations", format!("must be at most {}", MAX_ROUNDS)));
        }
        if self.max_execution_time_secs == 0 {
            return Err(ConfigError::invalid("max_execution_time_secs", "must be greater than 0"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid("timeout_secs", "must be greater than 0"));
        }
        if self.memory_window_size == 0 {
            return Err(ConfigError::invalid("memory_window_size", "must be at least 1"));
        }
        if self.max_results_per_query == 0 {
            return Err(ConfigError::invalid("max_results_per_query", "must be at least 1"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::invalid("max_concurrent_fetches", "must be at least 1"));
        }
        if !self.quality_threshold.is_finite() || !(0.0..=1.0).contains(&self.quality_threshold) {
            return Err(ConfigError::invalid("quality_threshold", "must be between 0.0 and 1.0"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_iterations: 5,
            verification_rounds: 3,
            max_execution_time_secs: 300,
            memory_window_size: 10,
            max_results_per_query: 20,
            quality_threshold: 0.7,
            timeout_secs: 30,
            max_concurrent_fetches: 4,
            max_related_terms: 3,
            topic_hint: "文物".to_string(),
            categories: vec!["general".to_string(), "images".to_string(), "news".to_string()],
            engines: vec!["bing".to_string(), "google".to_string(), "duckduckgo".to_string()],
            language: "zh-CN".to_string(),
            synonyms: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Quick preset: a single round with few sources
    pub fn quick() -> Self {
        Self {
            max_iterations: 1,
            verification_rounds: 1,
            max_execution_time_secs: 60,
            max_results_per_query: 5,
            timeout_secs: 15,
            max_related_terms: 1,
            ..Self::default()
        }
    }

    /// Thorough preset: more rounds, more sources, stricter quality bar
    pub fn thorough() -> Self {
        Self {
            max_iterations: 8,
            verification_rounds: 5,
            max_execution_time_secs: 600,
            max_results_per_query: 30,
            quality_threshold: 0.8,
            max_concurrent_fetches: 8,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}
