//! Port error types
//!
//! Each external port fails with its own error carrying a coarse reason the
//! controller can act on, plus a free-form message for logs.

use std::fmt;

/// Why a language model call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelErrorReason {
    /// The call did not finish in time
    Timeout,
    /// The provider refused because of request rate
    RateLimited,
    /// The answer could not be used
    InvalidResponse,
    /// The provider could not be reached or has no such model
    Unavailable,
}

/// Failure of a [`LanguageModel`](crate::traits::LanguageModel) call
#[derive(Debug, Clone, PartialEq)]
pub struct ModelError {
    /// Coarse reason
    pub reason: ModelErrorReason,
    /// Detail for logs
    pub message: String,
}

impl ModelError {
    /// Create an error with an explicit reason
    pub fn new(reason: ModelErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ModelErrorReason::Timeout, message)
    }

    /// Rate limit error
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ModelErrorReason::RateLimited, message)
    }

    /// Unusable answer
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ModelErrorReason::InvalidResponse, message)
    }

    /// Provider unreachable
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ModelErrorReason::Unavailable, message)
    }

    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.reason,
            ModelErrorReason::Timeout | ModelErrorReason::RateLimited | ModelErrorReason::Unavailable
        )
    }
}

impl fmt::Display for ModelErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelErrorReason::Timeout => "timeout",
            ModelErrorReason::RateLimited => "rate_limited",
            ModelErrorReason::InvalidResponse => "invalid_response",
            ModelErrorReason::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model error ({}): {}", self.reason, self.message)
    }
}

impl std::error::Error for ModelError {}

/// Why a search call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchErrorReason {
    /// The aggregator could not be reached (or timed out)
    Unreachable,
    /// The aggregator answered with something unusable
    BadResponse,
}

/// Failure of a [`SearchPort`](crate::traits::SearchPort) call
#[derive(Debug, Clone, PartialEq)]
pub struct SearchError {
    /// Coarse reason
    pub reason: SearchErrorReason,
    /// Detail for logs
    pub message: String,
}

impl SearchError {
    /// Aggregator unreachable
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            reason: SearchErrorReason::Unreachable,
            message: message.into(),
        }
    }

    /// Aggregator answered badly
    pub fn bad_response(message: impl Into<String>) -> Self {
        Self {
            reason: SearchErrorReason::BadResponse,
            message: message.into(),
        }
    }
}

impl fmt::Display for SearchErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchErrorReason::Unreachable => f.write_str("unreachable"),
            SearchErrorReason::BadResponse => f.write_str("bad_response"),
        }
    }
}

impl fmt::Display for SearchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "search error ({}): {}", self.reason, self.message)
    }
}

impl std::error::Error for SearchError {}

/// Why a content fetch failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorReason {
    /// Transport failure or timeout
    Network,
    /// The page could not be turned into text
    Parse,
    /// The site refused access
    Blocked,
}

/// Failure of a [`ContentFetchPort`](crate::traits::ContentFetchPort) call
#[derive(Debug, Clone, PartialEq)]
pub struct FetchError {
    /// Coarse reason
    pub reason: FetchErrorReason,
    /// Detail for logs
    pub message: String,
}

impl FetchError {
    /// Create an error with an explicit reason
    pub fn new(reason: FetchErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Transport failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FetchErrorReason::Network, message)
    }

    /// Unparseable page
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FetchErrorReason::Parse, message)
    }

    /// Access refused
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(FetchErrorReason::Blocked, message)
    }
}

impl fmt::Display for FetchErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FetchErrorReason::Network => "network",
            FetchErrorReason::Parse => "parse",
            FetchErrorReason::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fetch error ({}): {}", self.reason, self.message)
    }
}

impl std::error::Error for FetchError {}
