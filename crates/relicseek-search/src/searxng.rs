//! SearXNG metasearch client

use crate::{source_domain, USER_AGENT};
use relicseek_domain::traits::{SearchPort, SearchRequest};
use relicseek_domain::{RawHit, SearchError};
use relicseek_llm::block_on;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default SearXNG address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888";

/// Cap on a single result's relevance score
const MAX_RELEVANCE: f64 = 5.0;

/// URL fragments of authoritative sources and the bonus they earn
const AUTHORITY_BONUSES: &[(&[&str], f64)] = &[
    (&["museum", "gov.cn", "palace", "cultural"], 1.0),
    (&["edu.cn", "academic", "university", "scholar"], 0.8),
    (&["baike.baidu.com", "wikipedia", "britannica"], 0.6),
    (&["cul.cn", "wenhua", "heritage"], 0.4),
];

/// SearXNG connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearxngConfig {
    /// Instance address
    pub base_url: String,

    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// SafeSearch level (0 off, 1 moderate, 2 strict)
    pub safesearch: u8,
}

impl Default for SearxngConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            safesearch: 1,
        }
    }
}

#[derive(Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Deserialize)]
struct SearxngResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    engine: String,
}

/// Client for a SearXNG instance's JSON API
pub struct SearxngClient {
    config: SearxngConfig,
    client: reqwest::Client,
}

impl SearxngClient {
    /// Create a client
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] with reason `Unreachable` if the base URL does
    /// not parse or the HTTP client cannot be built.
    pub fn new(config: SearxngConfig) -> Result<Self, SearchError> {
        url::Url::parse(&config.base_url)
            .map_err(|e| SearchError::unreachable(format!("Invalid SearXNG url '{}': {}", config.base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::unreachable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// The active configuration
    pub fn config(&self) -> &SearxngConfig {
        &self.config
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.config.base_url.trim_end_matches('/'))
    }

    fn query_params(&self, request: &SearchRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", request.query.clone()),
            ("format", "json".to_string()),
            ("safesearch", self.config.safesearch.to_string()),
        ];
        if !request.language.is_empty() {
            params.push(("language", request.language.clone()));
        }
        if !request.categories.is_empty() {
            params.push(("categories", request.categories.join(",")));
        }
        if !request.engines.is_empty() {
            params.push(("engines", request.engines.join(",")));
        }
        params
    }

    /// Run a search against the instance
    pub async fn search_async(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError> {
        info!("SearXNG search: '{}' (limit {})", request.query, request.limit);

        let response = self
            .client
            .get(self.search_url())
            .query(&self.query_params(request))
            .send()
            .await
            .map_err(|e| SearchError::unreachable(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::bad_response(format!("HTTP {}", status)));
        }

        let body: SearxngResponse = response
            .json()
            .await
            .map_err(|e| SearchError::bad_response(format!("Failed to parse results: {}", e)))?;

        debug!("SearXNG returned {} raw results", body.results.len());
        Ok(rank_results(body.results, &request.query, request.limit))
    }

    /// Check that the instance answers at all
    pub async fn health_check(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(&self.config.base_url)
            .send()
            .await
            .map_err(|e| SearchError::unreachable(format!("Request failed: {}", e)))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SearchError::bad_response(format!("HTTP {}", response.status())))
        }
    }
}

impl SearchPort for SearxngClient {
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawHit>, SearchError> {
        block_on(self.search_async(request))
            .map_err(|e| SearchError::unreachable(format!("Runtime error: {}", e)))?
    }
}

/// Bonus for results from museums, academia, encyclopedias and cultural media
pub fn authority_bonus(url: &str) -> f64 {
    let url = url.to_lowercase();
    AUTHORITY_BONUSES
        .iter()
        .find(|(fragments, _)| fragments.iter().any(|f| url.contains(f)))
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0.0)
}

/// Relevance of a result to the query, in [0, 5]
///
/// Each query term found in the title scores 0.4, in the snippet 0.3 and in
/// the URL 0.1, plus the source's [`authority_bonus`].
pub fn relevance_score(query: &str, title: &str, content: &str, url: &str) -> f64 {
    let query = query.to_lowercase();
    let terms: std::collections::BTreeSet<&str> = query.split_whitespace().collect();
    let title = title.to_lowercase();
    let content = content.to_lowercase();
    let url_lower = url.to_lowercase();

    let count = |text: &str| terms.iter().filter(|t| text.contains(*t)).count() as f64;
    let score = count(&title) * 0.4 + count(&content) * 0.3 + count(&url_lower) * 0.1 + authority_bonus(url);
    score.min(MAX_RELEVANCE)
}

/// Order results by relevance, drop duplicates and unusable URLs, assign ranks
fn rank_results(results: Vec<SearxngResult>, query: &str, limit: usize) -> Vec<RawHit> {
    let mut scored: Vec<(f64, usize, SearxngResult)> = results
        .into_iter()
        .enumerate()
        .filter(|(_, r)| source_domain(&r.url).is_some())
        .map(|(idx, r)| (relevance_score(query, &r.title, &r.content, &r.url), idx, r))
        .collect();

    // Stable on ties: keep the aggregator's own order
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

    let mut seen = std::collections::HashSet::new();
    scored
        .into_iter()
        .filter(|(_, _, r)| seen.insert(r.url.clone()))
        .take(limit)
        .enumerate()
        .map(|(pos, (_, _, r))| {
            RawHit::new(r.url, r.title, pos as u32 + 1)
                .with_snippet(r.content)
                .with_engine(r.engine)
        })
        .collect()
}
