//! Capability registry and port bundle
//!
//! The registry maps each model capability to the backend that serves it.
//! It is assembled with a builder and then shared read-only by every
//! session, so routing cannot change while a session runs.

use relicseek_domain::traits::{ContentFetchPort, LanguageModel, ReportSynthesizer, SearchPort};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Things the research loop asks a language model to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Read the query: complexity, type, entities
    QueryAnalysis,
    /// Suggest related terms for a facet
    RelatedTerms,
    /// Extract facts from a fetched page
    FactExtraction,
    /// Judge whether the evidence answers the query
    SufficiencyAssessment,
    /// Phrase the final report
    ReportSynthesis,
}

impl Capability {
    /// Every capability
    pub const ALL: [Capability; 5] = [
        Capability::QueryAnalysis,
        Capability::RelatedTerms,
        Capability::FactExtraction,
        Capability::SufficiencyAssessment,
        Capability::ReportSynthesis,
    ];

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::QueryAnalysis => "query_analysis",
            Capability::RelatedTerms => "related_terms",
            Capability::FactExtraction => "fact_extraction",
            Capability::SufficiencyAssessment => "sufficiency_assessment",
            Capability::ReportSynthesis => "report_synthesis",
        }
    }

    /// Parse a capability name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name.trim())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability to language model routing
#[derive(Clone)]
pub struct CapabilityRegistry {
    default: Arc<dyn LanguageModel>,
    overrides: BTreeMap<Capability, Arc<dyn LanguageModel>>,
}

impl CapabilityRegistry {
    /// Route every capability to `default`
    pub fn new(default: Arc<dyn LanguageModel>) -> Self {
        Self {
            default,
            overrides: BTreeMap::new(),
        }
    }

    /// Route one capability to a different model
    pub fn with(mut self, capability: Capability, model: Arc<dyn LanguageModel>) -> Self {
        self.overrides.insert(capability, model);
        self
    }

    /// Model serving `capability`
    pub fn resolve(&self, capability: Capability) -> Arc<dyn LanguageModel> {
        self.overrides
            .get(&capability)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    /// Capability and model name pairs, for status output
    pub fn describe(&self) -> Vec<(Capability, String)> {
        Capability::ALL
            .iter()
            .map(|c| (*c, self.resolve(*c).name().to_string()))
            .collect()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.describe().into_iter().map(|(c, name)| (c.as_str(), name)))
            .finish()
    }
}

/// Everything the engine talks to
#[derive(Clone)]
pub struct Ports {
    /// Language models, by capability
    pub models: Arc<CapabilityRegistry>,
    /// Web search
    pub search: Arc<dyn SearchPort>,
    /// Page fetching
    pub fetch: Arc<dyn ContentFetchPort>,
    /// Final report writer
    pub synthesizer: Arc<dyn ReportSynthesizer>,
}

impl Ports {
    /// Bundle the ports
    pub fn new(
        models: CapabilityRegistry,
        search: Arc<dyn SearchPort>,
        fetch: Arc<dyn ContentFetchPort>,
        synthesizer: Arc<dyn ReportSynthesizer>,
    ) -> Self {
        Self {
            models: Arc::new(models),
            search,
            fetch,
            synthesizer,
        }
    }
}
