//! RelicSeek research engine
//!
//! Iterative research over web sources: a query is analyzed, searched,
//! fetched, distilled into evidence, scored, and reflected on until the
//! evidence answers the query or a limit is hit.
//!
//! # Components
//!
//! - [`QueryPlanner`]: query analysis and per-round search plans
//! - [`EvidenceAggregator`]: fact extraction and the idempotent evidence merge
//! - [`CredibilityScorer`]: source-class based trust weights
//! - [`ResearchEngine`]: the state machine driving a session
//! - [`CapabilityRegistry`]: which language model serves which capability
//!
//! # Example
//!
//! ```no_run
//! use relicseek_engine::{CapabilityRegistry, Ports, PromptLibrary, ResearchEngine, SessionConfig, SessionRequest};
//! use relicseek_domain::traits::DigestSynthesizer;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(
//! #     model: Arc<dyn relicseek_domain::traits::LanguageModel>,
//! #     search: Arc<dyn relicseek_domain::traits::SearchPort>,
//! #     fetch: Arc<dyn relicseek_domain::traits::ContentFetchPort>,
//! # ) {
//! let ports = Ports::new(CapabilityRegistry::new(model), search, fetch, Arc::new(DigestSynthesizer));
//! let engine = ResearchEngine::new(ports, PromptLibrary::builtin(), SessionConfig::default());
//!
//! let response = engine
//!     .search(SessionRequest::new("马踏飞燕的材质是什么？"), CancellationToken::new())
//!     .await
//!     .unwrap();
//! if let Some(report) = response.report {
//!     println!("{}", report.body);
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregator;
mod calls;
pub mod config;
pub mod controller;
pub mod error;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod registry;
pub mod scorer;
pub mod session;

pub use aggregator::{AbsorbStats, EvidenceAggregator, MergeOutcome};
pub use config::{SessionConfig, MAX_ROUNDS};
pub use controller::ResearchEngine;
pub use error::{CancelReason, ConfigError, FailureReason, PlanningError, PromptError};
pub use parser::FactRecord;
pub use planner::QueryPlanner;
pub use prompt::{PromptLibrary, PromptName, PromptSource};
pub use registry::{Capability, CapabilityRegistry, Ports};
pub use scorer::{CredibilityScorer, DomainClass};
pub use session::{
    Confidence, EvidenceSummary, RoundReport, Session, SessionFailure, SessionId, SessionRequest, SessionResponse,
    SessionState,
};
