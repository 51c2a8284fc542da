//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the research loop and
//! infrastructure. All ports are shared between concurrent sessions, so they
//! are `Send + Sync` and used through `Arc<dyn ...>`. Calls are synchronous;
//! the engine runs them on blocking threads and bounds them with a timeout.

use crate::error::{FetchError, ModelError, SearchError};
use crate::evidence::EvidenceSet;
use crate::hit::RawHit;
use crate::query::Query;
use crate::report::Report;

/// Trait for language model operations
///
/// Implemented by the infrastructure layer (relicseek-llm)
pub trait LanguageModel: Send + Sync {
    /// Short name for logs and reports (e.g. the model id)
    fn name(&self) -> &str;

    /// Complete a prompt given a system context
    fn complete(&self, prompt: &str, context: &str) -> Result<String, ModelError>;

    /// Complete a prompt whose answer must follow a JSON schema
    ///
    /// Providers without native structured output fall back to appending the
    /// schema to the prompt.
    fn complete_structured(&self, prompt: &str, context: &str, schema: &str) -> Result<String, ModelError> {
        let prompt = format!("{}\n\nRespond with JSON matching this schema:\n{}", prompt, schema);
        self.complete(&prompt, context)
    }
}

/// Options for one search call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchRequest {
    /// Query string
    pub query: String,

    /// Aggregator categories (e.g. "general", "news")
    pub categories: Vec<String>,

    /// Engines to fan out to
    pub engines: Vec<String>,

    /// Result language (e.g. "zh-CN")
    pub language: String,

    /// Maximum hits to return
    pub limit: usize,
}

impl SearchRequest {
    /// Create a request for a query with defaults for everything else
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            ..Default::default()
        }
    }
}

/// Trait for web search
///
/// Implemented by the infrastructure layer (relicseek-search)
pub trait SearchPort: Send + Sync {
    /// Run a search, returning hits ordered by rank
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError>;
}

/// Trait for turning a URL into plain text
///
/// Implemented by the infrastructure layer (relicseek-search)
pub trait ContentFetchPort: Send + Sync {
    /// Fetch a page and extract its text
    fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Trait for turning the final evidence into a report
///
/// Implemented by the application layer (relicseek-synthesizer). Never fails:
/// implementations fall back to [`Report::digest`].
pub trait ReportSynthesizer: Send + Sync {
    /// Produce the report for a finished session
    fn synthesize(&self, set: &EvidenceSet, query: &Query) -> Report;
}

/// Synthesizer that always returns the plain digest
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSynthesizer;

impl ReportSynthesizer for DigestSynthesizer {
    fn synthesize(&self, set: &EvidenceSet, query: &Query) -> Report {
        Report::digest(set, query)
    }
}
