//! Web page fetching

use crate::html::{extract_page_text, truncate_chars};
use crate::USER_AGENT;
use relicseek_domain::traits::ContentFetchPort;
use relicseek_domain::FetchError;
use relicseek_llm::block_on;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Fetcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Request timeout (seconds)
    pub timeout_secs: u64,

    /// Maximum characters of text kept per page
    pub max_length: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_length: 5000,
        }
    }
}

/// Downloads pages and reduces them to readable text
pub struct WebFetcher {
    config: FetchConfig,
    client: reqwest::Client,
}

impl WebFetcher {
    /// Create a fetcher
    ///
    /// # Errors
    ///
    /// Returns a `Network` [`FetchError`] if the HTTP client cannot be built.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Fetch a page and return its title and text
    pub async fn fetch_async(&self, raw_url: &str) -> Result<String, FetchError> {
        let url = url::Url::parse(raw_url).map_err(|e| FetchError::parse(format!("Invalid url '{}': {}", raw_url, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(FetchError::parse(format!("Unsupported scheme '{}'", url.scheme())));
        }

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .map_err(|e| FetchError::network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if is_blocking_status(status.as_u16()) {
            return Err(FetchError::blocked(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::network(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_lowercase();
        if !is_textual(&content_type) {
            return Err(FetchError::parse(format!("Unsupported content type '{}'", content_type)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::parse(format!("Failed to read body: {}", e)))?;

        let text = self.page_to_text(&body, &content_type)?;
        debug!("Fetched {} ({} chars of text)", raw_url, text.chars().count());
        Ok(text)
    }

    fn page_to_text(&self, body: &str, content_type: &str) -> Result<String, FetchError> {
        let text = if content_type.starts_with("text/plain") {
            body.trim().to_string()
        } else {
            let page = extract_page_text(body);
            if page.title.is_empty() {
                page.text
            } else {
                format!("{}\n\n{}", page.title, page.text)
            }
        };

        if text.trim().is_empty() {
            return Err(FetchError::parse("Page has no readable text"));
        }
        Ok(truncate_chars(&text, self.config.max_length))
    }
}

impl ContentFetchPort for WebFetcher {
    fn fetch(&self, url: &str) -> Result<String, FetchError> {
        block_on(self.fetch_async(url)).map_err(|e| FetchError::network(format!("Runtime error: {}", e)))?
    }
}

fn is_blocking_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 429 | 451)
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.contains("html")
        || content_type.contains("xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicseek_domain::FetchErrorReason;

    #[test]
    fn test_blocking_statuses() {
        assert!(is_blocking_status(403));
        assert!(is_blocking_status(429));
        assert!(!is_blocking_status(404));
        assert!(!is_blocking_status(500));
    }

    #[test]
    fn test_textual_content_types() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(!is_textual("application/pdf"));
        assert!(!is_textual("image/png"));
    }

    #[test]
    fn test_page_to_text_truncates() {
        let fetcher = WebFetcher::new(FetchConfig {
            max_length: 5,
            ..Default::default()
        })
        .unwrap();
        let text = fetcher.page_to_text("<p>abcdefgh</p>", "text/html").unwrap();
        assert_eq!(text, "abcde...");
    }

    #[test]
    fn test_page_to_text_keeps_title() {
        let fetcher = WebFetcher::new(FetchConfig::default()).unwrap();
        let text = fetcher
            .page_to_text("<title>铜奔马</title><body><p>甘肃省博物馆藏</p></body>", "text/html")
            .unwrap();
        assert_eq!(text, "铜奔马\n\n甘肃省博物馆藏");
    }

    #[test]
    fn test_empty_page_is_parse_error() {
        let fetcher = WebFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.page_to_text("<script>x()</script>", "text/html").unwrap_err();
        assert_eq!(err.reason, FetchErrorReason::Parse);
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let fetcher = WebFetcher::new(FetchConfig::default()).unwrap();
        let err = fetcher.fetch("ftp://example.com/file").unwrap_err();
        assert_eq!(err.reason, FetchErrorReason::Parse);

        let err = fetcher.fetch("not a url").unwrap_err();
        assert_eq!(err.reason, FetchErrorReason::Parse);
    }
}
