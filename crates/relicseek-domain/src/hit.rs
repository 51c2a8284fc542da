//! Raw search hits

/// One result row returned by a search port
///
/// Ephemeral: consumed by the aggregator and not kept after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Result URL
    pub url: String,

    /// Page title
    pub title: String,

    /// Snippet shown by the engine
    pub snippet: String,

    /// Engine that produced the hit (e.g. "bing")
    pub source_engine: String,

    /// 1-based position in the result list, lower is better
    pub rank: u32,
}

impl RawHit {
    /// Create a hit
    pub fn new(url: impl Into<String>, title: impl Into<String>, rank: u32) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: String::new(),
            source_engine: String::new(),
            rank,
        }
    }

    /// Set the snippet
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    /// Set the engine name
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.source_engine = engine.into();
        self
    }
}
