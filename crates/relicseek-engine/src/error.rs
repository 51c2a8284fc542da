//! Error types for the research engine

use relicseek_domain::{ModelError, SearchError};
use std::fmt;
use thiserror::Error;

/// The planner could not produce a usable plan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    /// The query text is blank
    #[error("Query is empty")]
    EmptyQuery,

    /// The analysis call failed
    #[error("Query analysis failed: {0}")]
    Model(ModelError),

    /// The model answered, but not with an analysis
    #[error("Unusable query analysis: {0}")]
    InvalidAnalysis(String),

    /// A prompt could not be rendered
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The session was cancelled or ran out of time mid-call
    #[error("Planning interrupted")]
    Interrupted,
}

/// Session configuration rejected at start
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A value is out of range
    #[error("Invalid configuration: {field} {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// TOML could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// TOML could not be produced
    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Prompt template errors
#[derive(Error, Debug)]
pub enum PromptError {
    /// The caller did not supply every variable the template needs
    #[error("Missing template variables for '{name}': {missing:?}")]
    MissingVariables {
        /// Template name
        name: &'static str,
        /// Variables not supplied
        missing: Vec<String>,
    },

    /// A template override could not be read
    #[error("Failed to read prompt '{name}': {source}")]
    Io {
        /// Template name
        name: &'static str,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A template could not be compiled or rendered
    #[error("Prompt template '{name}' failed: {message}")]
    Template {
        /// Template name
        name: &'static str,
        /// Handlebars diagnostic
        message: String,
    },
}

/// Who stopped a session early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller cancelled
    User,
    /// `max_execution_time` ran out before any round completed
    TimeBudget,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::User => f.write_str("cancelled by caller"),
            CancelReason::TimeBudget => f.write_str("time budget exhausted"),
        }
    }
}

/// Why a session ended in the failed state
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// Planning failed
    #[error("Planning failed: {0}")]
    Planning(PlanningError),

    /// Every search step of a round failed
    #[error("All searches failed in round {round}: {last_error}")]
    Search {
        /// Round in which the searches failed
        round: u32,
        /// Error of the last failing step
        last_error: SearchError,
    },

    /// The sufficiency assessment failed
    #[error("Reflection failed: {0}")]
    Model(ModelError),

    /// The session was stopped before finishing
    #[error("Cancelled: {0}")]
    Cancelled(CancelReason),
}

impl FailureReason {
    /// Short machine-friendly tag
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::Planning(_) => "planning_error",
            FailureReason::Search { .. } => "search_error",
            FailureReason::Model(_) => "model_error",
            FailureReason::Cancelled(_) => "cancelled",
        }
    }
}
