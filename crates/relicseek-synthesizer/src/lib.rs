//! RelicSeek Synthesizer
//!
//! Turns the evidence of a finished research session into the final report.
//!
//! # Architecture
//!
//! ```text
//! EvidenceSet + Query → FinalSummary prompt → LLM → Report
//!                                  ↓ (error or empty answer)
//!                            Report::digest
//! ```
//!
//! The synthesizer never fails a session: whatever goes wrong with the model,
//! the caller still receives the plain digest of the evidence.
//!
//! # Example Usage
//!
//! ```no_run
//! use relicseek_synthesizer::LlmReportSynthesizer;
//! use relicseek_engine::PromptLibrary;
//! use relicseek_llm::MockProvider;
//! use std::sync::Arc;
//!
//! let synthesizer = LlmReportSynthesizer::new(
//!     Arc::new(MockProvider::new("铜奔马为东汉青铜器。")),
//!     Arc::new(PromptLibrary::builtin()),
//! );
//! ```

#![warn(missing_docs)]

mod synthesizer;


pub use synthesizer::{LlmReportSynthesizer, DEFAULT_EVIDENCE_LIMIT};
