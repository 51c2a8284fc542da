//! Model-written reports with a digest fallback

use relicseek_domain::traits::{LanguageModel, ReportSynthesizer};
use relicseek_domain::{EvidenceSet, Query, Report};
use relicseek_engine::prompt::{analysis_line, conflict_lines, evidence_lines};
use relicseek_engine::{PromptLibrary, PromptName};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Records passed to the model; the rest are summarized as a count
pub const DEFAULT_EVIDENCE_LIMIT: usize = 30;

/// Report synthesizer backed by a language model
pub struct LlmReportSynthesizer {
    model: Arc<dyn LanguageModel>,
    prompts: Arc<PromptLibrary>,
    evidence_limit: usize,
}

impl LlmReportSynthesizer {
    /// Create a synthesizer using `model` and the FinalSummary template of `prompts`
    pub fn new(model: Arc<dyn LanguageModel>, prompts: Arc<PromptLibrary>) -> Self {
        Self {
            model,
            prompts,
            evidence_limit: DEFAULT_EVIDENCE_LIMIT,
        }
    }

    /// Cap the number of records rendered into the prompt
    pub fn with_evidence_limit(mut self, limit: usize) -> Self {
        self.evidence_limit = limit.max(1);
        self
    }

    fn prompt(&self, set: &EvidenceSet, query: &Query) -> Option<String> {
        let mut evidence = evidence_lines(set, self.evidence_limit);
        let sources = cited_urls(set);
        if !sources.is_empty() {
            evidence.push_str("\n\nSources:\n");
            let lines: Vec<String> = sources.iter().map(|url| format!("- {}", url)).collect();
            evidence.push_str(&lines.join("\n"));
        }
        let analysis = analysis_line(&query.analysis);
        let conflicts = conflict_lines(set);

        match self.prompts.render(
            PromptName::FinalSummary,
            &[
                ("query", query.text.as_str()),
                ("analysis", analysis.as_str()),
                ("evidence", evidence.as_str()),
                ("conflicts", conflicts.as_str()),
            ],
        ) {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                warn!("Final summary prompt unusable: {}", e);
                None
            }
        }
    }
}

impl ReportSynthesizer for LlmReportSynthesizer {
    fn synthesize(&self, set: &EvidenceSet, query: &Query) -> Report {
        let Some(prompt) = self.prompt(set, query) else {
            return Report::digest(set, query);
        };

        match self.model.complete(&prompt, self.prompts.system()) {
            Ok(body) if !body.trim().is_empty() => {
                debug!("Report for '{}' written by {}", query.text, self.model.name());
                Report {
                    title: query.text.clone(),
                    body: body.trim().to_string(),
                    cited_urls: cited_urls(set),
                    generated_by: self.model.name().to_string(),
                }
            }
            Ok(_) => {
                warn!("{} returned an empty report, using digest", self.model.name());
                Report::digest(set, query)
            }
            Err(e) => {
                warn!("Report synthesis failed ({}), using digest", e);
                Report::digest(set, query)
            }
        }
    }
}

fn cited_urls(set: &EvidenceSet) -> Vec<String> {
    let urls: BTreeSet<&String> = set.iter().flat_map(|e| e.source_urls.iter()).collect();
    urls.into_iter().cloned().collect()
}
