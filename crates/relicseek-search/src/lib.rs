//! RelicSeek Search Layer
//!
//! Implementations of the `SearchPort` and `ContentFetchPort` traits from
//! `relicseek-domain`.
//!
//! # Components
//!
//! - `SearxngClient`: JSON API client for a SearXNG metasearch instance, with
//!   relevance re-ranking that favours museum and academic sources
//! - `WebFetcher`: downloads a page and reduces it to readable text
//! - `MockSearch` / `MockFetcher`: deterministic doubles for tests
//!
//! # Example
//!
//! ```no_run
//! use relicseek_search::{SearxngClient, SearxngConfig};
//! use relicseek_domain::traits::{SearchPort, SearchRequest};
//!
//! let client = SearxngClient::new(SearxngConfig::default()).unwrap();
//! let hits = client.search(&SearchRequest::new("马踏飞燕 文物", 10)).unwrap();
//! for hit in hits {
//!     println!("{} {}", hit.rank, hit.url);
//! }
//! ```

#![warn(missing_docs)]

pub mod fetch;
pub mod html;
pub mod mock;
pub mod searxng;

pub use fetch::{FetchConfig, WebFetcher};
pub use mock::{MockFetcher, MockSearch};
pub use searxng::{SearxngClient, SearxngConfig};

/// User agent sent with every request
pub const USER_AGENT: &str = "RelicSeek/1.0 (Cultural Heritage Search System)";

/// Host of a URL without a leading `www.`, or `None` if it does not parse
///
/// # Examples
///
/// ```
/// use relicseek_search::source_domain;
///
/// assert_eq!(source_domain("https://www.dpm.org.cn/collection/1.html").as_deref(), Some("dpm.org.cn"));
/// assert_eq!(source_domain("not a url"), None);
/// ```
pub fn source_domain(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}
