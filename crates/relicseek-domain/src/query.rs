//! Query module - the user's question and what the model made of it

use std::fmt;

/// How much work a query is expected to need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Complexity {
    /// A single well-known artifact, usually one round is enough
    Simple,
    /// Needs a few facets checked
    #[default]
    Moderate,
    /// Several entities or contested facts
    Complex,
}

impl Complexity {
    /// Parse a complexity label, accepting English and Chinese forms
    ///
    /// Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "simple" | "easy" | "简单" => Some(Complexity::Simple),
            "moderate" | "medium" | "中等" => Some(Complexity::Moderate),
            "complex" | "hard" | "复杂" => Some(Complexity::Complex),
            _ => None,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of answer the user is after
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryType {
    /// A specific named artifact
    #[default]
    Entity,
    /// A broader subject (a dynasty's bronzes, a kiln, a technique)
    Topic,
    /// Two or more artifacts set against each other
    Comparison,
}

impl QueryType {
    /// Parse a query type label, accepting English and Chinese forms
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "entity" | "artifact" | "实体" | "文物" => Some(QueryType::Entity),
            "topic" | "theme" | "主题" | "专题" => Some(QueryType::Topic),
            "comparison" | "compare" | "比较" | "对比" => Some(QueryType::Comparison),
            _ => None,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Entity => "entity",
            QueryType::Topic => "topic",
            QueryType::Comparison => "comparison",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reading of a query, produced once per session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryAnalysis {
    /// Expected difficulty
    pub complexity: Complexity,

    /// Kind of query
    pub query_type: QueryType,

    /// Named entities or topic facets, most important first
    pub entities: Vec<String>,

    /// One-line restatement of the intent (may be empty)
    pub summary: String,
}

/// A research query
///
/// Immutable once the planner has analyzed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Raw user input
    pub text: String,

    /// Derived analysis
    pub analysis: QueryAnalysis,
}

impl Query {
    /// Create a query from raw text and its analysis
    pub fn new(text: impl Into<String>, analysis: QueryAnalysis) -> Self {
        Self {
            text: text.into(),
            analysis,
        }
    }

    /// The main subject: the first entity, or the raw text when none were found
    pub fn anchor(&self) -> &str {
        self.analysis
            .entities
            .first()
            .map(String::as_str)
            .unwrap_or(self.text.as_str())
    }
}
