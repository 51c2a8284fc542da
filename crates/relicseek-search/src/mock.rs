//! Deterministic search and fetch doubles
//!
//! Both doubles are cheap to clone and share their state, so a test can keep
//! a handle for assertions after moving a clone into the engine.

use relicseek_domain::traits::{ContentFetchPort, SearchPort, SearchRequest};
use relicseek_domain::{FetchError, RawHit, SearchError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted search port
///
/// Rules match when the query contains their pattern and are tried in the
/// order they were added. Unmatched queries return the default hits.
#[derive(Debug, Clone, Default)]
pub struct MockSearch {
    rules: Arc<Mutex<Vec<(String, Result<Vec<RawHit>, SearchError>)>>>,
    default_hits: Arc<Mutex<Vec<RawHit>>>,
    failure: Arc<Mutex<Option<SearchError>>>,
    queries: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

impl MockSearch {
    /// Create a search double returning no hits
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Hits for queries containing `pattern`
    pub fn add_hits(&self, pattern: impl Into<String>, hits: Vec<RawHit>) {
        lock(&self.rules).push((pattern.into(), Ok(hits)));
    }

    /// Error for queries containing `pattern`
    pub fn add_error(&self, pattern: impl Into<String>, error: SearchError) {
        lock(&self.rules).push((pattern.into(), Err(error)));
    }

    /// Hits for queries matching no rule
    pub fn set_default_hits(&self, hits: Vec<RawHit>) {
        *lock(&self.default_hits) = hits;
    }

    /// Fail every query with `error`, regardless of rules
    pub fn fail_all(&self, error: SearchError) {
        *lock(&self.failure) = Some(error);
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }

    /// Number of searches run
    pub fn call_count(&self) -> usize {
        lock(&self.queries).len()
    }
}

impl SearchPort for MockSearch {
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError> {
        lock(&self.queries).push(request.query.clone());

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        if let Some(error) = lock(&self.failure).clone() {
            return Err(error);
        }

        let rules = lock(&self.rules);
        let result = rules
            .iter()
            .find(|(pattern, _)| request.query.contains(pattern.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_else(|| Ok(lock(&self.default_hits).clone()));

        result.map(|hits| hits.into_iter().take(request.limit).collect())
    }
}

/// Scripted content fetch port
///
/// Unknown URLs fail with a `Network` error.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, Result<String, FetchError>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

impl MockFetcher {
    /// Create a fetcher with no pages
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Serve `text` for `url`
    pub fn add_page(&self, url: impl Into<String>, text: impl Into<String>) {
        lock(&self.pages).insert(url.into(), Ok(text.into()));
    }

    /// Fail `url` with `error`
    pub fn add_error(&self, url: impl Into<String>, error: FetchError) {
        lock(&self.pages).insert(url.into(), Err(error));
    }

    /// URLs fetched so far, in call order
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }

    /// Number of fetches run
    pub fn call_count(&self) -> usize {
        lock(&self.fetched).len()
    }
}

impl ContentFetchPort for MockFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        lock(&self.fetched).push(url.to_string());

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        lock(&self.pages)
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::network(format!("No page scripted for {}", url))))
    }
}
