//! Final report payload

use crate::evidence::EvidenceSet;
use crate::query::Query;
use std::collections::BTreeSet;

/// User-facing research report
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    /// Report title
    pub title: String,

    /// Plain-text body
    pub body: String,

    /// Every URL the report draws on
    pub cited_urls: Vec<String>,

    /// What produced the body ("digest" or a model name)
    pub generated_by: String,
}

impl Report {
    /// Deterministic plain-text digest of an evidence set
    ///
    /// Used when no model is available to phrase the report, or when the
    /// model call fails.
    pub fn digest(set: &EvidenceSet, query: &Query) -> Self {
        let mut body = String::new();

        if set.is_empty() {
            body.push_str("No evidence was found for this query.\n");
        }

        for evidence in set.ranked() {
            body.push_str(&format!(
                "{} (credibility {:.2}, {} source{})\n",
                evidence.name,
                evidence.credibility,
                evidence.source_urls.len(),
                if evidence.source_urls.len() == 1 { "" } else { "s" }
            ));
            for (field, value) in &evidence.fact_fields {
                body.push_str(&format!("  {}: {}\n", field, value));
            }
            for conflict in set.conflicts().filter(|c| c.evidence_id == evidence.id) {
                let candidates: Vec<String> = conflict
                    .candidates
                    .iter()
                    .map(|c| format!("{} [{}]", c.value, c.source_url))
                    .collect();
                body.push_str(&format!("  ! {} disputed: {}\n", conflict.field, candidates.join(" / ")));
            }
            body.push('\n');
        }

        let cited_urls: BTreeSet<String> = set
            .iter()
            .flat_map(|e| e.source_urls.iter().cloned())
            .collect();

        Self {
            title: query.text.clone(),
            body: body.trim_end().to_string(),
            cited_urls: cited_urls.into_iter().collect(),
            generated_by: "digest".to_string(),
        }
    }
}
