//! RelicSeek Domain Layer
//!
//! This crate contains the data model and port interfaces of the RelicSeek
//! research loop. It depends only on `uuid` and defines the fundamental
//! concepts, value objects, and trait interfaces that all other layers
//! depend upon.
//!
//! ## Key Concepts
//!
//! - **Query**: The user's question plus its derived analysis
//! - **SearchPlan**: The keyword sets to search in one round
//! - **Evidence**: A deduplicated fact record merged from one or more sources
//! - **Conflict**: A recorded disagreement between sources on one fact field
//! - **ReflectionVerdict**: The per-round judgment of whether to stop
//!
//! ## Architecture
//!
//! - Pure data and comparison logic only
//! - Infrastructure implementations (LLM clients, search, fetch) live in other crates
//! - Trait definitions for all external interactions live in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod evidence;
pub mod hit;
pub mod normalize;
pub mod plan;
pub mod query;
pub mod report;
pub mod traits;
pub mod verdict;

// Re-exports for convenience
pub use error::{FetchError, FetchErrorReason, ModelError, ModelErrorReason, SearchError, SearchErrorReason};
pub use evidence::{CandidateValue, Conflict, Evidence, EvidenceId, EvidenceSet};
pub use hit::RawHit;
pub use normalize::SynonymTable;
pub use plan::{SearchPlan, SearchStep};
pub use query::{Complexity, Query, QueryAnalysis, QueryType};
pub use report::Report;
pub use verdict::ReflectionVerdict;
