//! Evidence aggregation
//!
//! Fetched pages go through fact extraction concurrently; the extracted
//! records are then merged into the evidence set one at a time, in hit
//! order. Merging the same records twice changes nothing.

use crate::calls::{CallError, PortCaller};
use crate::parser::{parse_facts, FactRecord};
use crate::prompt::{PromptLibrary, PromptName};
use crate::registry::{Capability, CapabilityRegistry};
use crate::scorer::source_score;
use relicseek_domain::{CandidateValue, Evidence, EvidenceSet, FetchError, Query, RawHit, SynonymTable};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Characters of page text kept on a new record
const EXCERPT_CHARS: usize = 500;

/// Characters of page text sent to the extraction prompt
const EXTRACTION_INPUT_CHARS: usize = 4000;

/// What one absorb pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbsorbStats {
    /// Distinct hits considered
    pub hits: usize,
    /// Hits skipped because their fetch failed
    pub fetch_failures: usize,
    /// Hits skipped because extraction failed
    pub extraction_failures: usize,
    /// Records extracted
    pub records: usize,
    /// New evidence created
    pub created: usize,
    /// Existing evidence that gained a source or a field
    pub merged: usize,
    /// Conflicts opened
    pub conflicts_opened: usize,
    /// Candidates added to conflicts that were already open
    pub candidates_added: usize,
    /// Extraction stopped because the session was cancelled or ran out of time
    pub interrupted: bool,
}

/// Result of merging one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new record was created
    Created,
    /// An existing record changed
    Merged {
        /// Conflicts opened by this merge
        conflicts_opened: usize,
        /// Candidates added to already open conflicts
        candidates_added: usize,
    },
    /// Nothing changed
    Unchanged,
}

enum FieldAction {
    Fill(String, String),
    Open(String, String, String, String),
    Support(String, String),
}

/// Turns fetched pages into evidence
pub struct EvidenceAggregator {
    models: Arc<CapabilityRegistry>,
    prompts: Arc<PromptLibrary>,
    synonyms: Arc<SynonymTable>,
}

impl EvidenceAggregator {
    /// Create an aggregator
    pub fn new(models: Arc<CapabilityRegistry>, prompts: Arc<PromptLibrary>, synonyms: Arc<SynonymTable>) -> Self {
        Self {
            models,
            prompts,
            synonyms,
        }
    }

    /// Extract facts from every successfully fetched hit and merge them into `set`
    ///
    /// Failed fetches and failed extractions are counted and skipped. If the
    /// session is interrupted during extraction nothing is merged.
    pub(crate) async fn absorb(
        &self,
        query: &Query,
        hits: &[RawHit],
        fetched: &BTreeMap<String, Result<String, FetchError>>,
        set: &mut EvidenceSet,
        round: u32,
        max_concurrent: usize,
        caller: &PortCaller,
    ) -> AbsorbStats {
        let mut stats = AbsorbStats::default();
        let mut seen = BTreeSet::new();
        let mut pages = Vec::new();

        for hit in hits {
            if !seen.insert(hit.url.clone()) {
                continue;
            }
            stats.hits += 1;
            match fetched.get(&hit.url) {
                Some(Ok(text)) => pages.push((hit.clone(), text.clone())),
                Some(Err(e)) => {
                    debug!("Skipping {}: {}", hit.url, e);
                    stats.fetch_failures += 1;
                }
                None => stats.fetch_failures += 1,
            }
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(pages.len());
        for (hit, text) in pages {
            let prompt = match self.prompts.render(
                PromptName::FactExtraction,
                &[
                    ("query", query.text.as_str()),
                    ("url", hit.url.as_str()),
                    ("title", hit.title.as_str()),
                    ("text", clip(&text, EXTRACTION_INPUT_CHARS).as_str()),
                ],
            ) {
                Ok(prompt) => prompt,
                Err(e) => {
                    warn!("Extraction prompt for {} failed: {}", hit.url, e);
                    stats.extraction_failures += 1;
                    continue;
                }
            };

            let model = self.models.resolve(Capability::FactExtraction);
            let system = self.prompts.system().to_string();
            let semaphore = Arc::clone(&semaphore);
            let caller = caller.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = caller
                    .run(move || model.complete_structured(&prompt, &system, "fact extraction JSON array"))
                    .await;
                (hit, text, result)
            }));
        }

        let mut extracted = Vec::new();
        for handle in handles {
            let Ok((hit, text, result)) = handle.await else {
                stats.extraction_failures += 1;
                continue;
            };
            match result {
                Ok(response) => match parse_facts(&response) {
                    Ok(records) => extracted.push((hit, text, records)),
                    Err(e) => {
                        warn!("Unusable extraction for {}: {}", hit.url, e);
                        stats.extraction_failures += 1;
                    }
                },
                Err(CallError::Interrupted) => stats.interrupted = true,
                Err(e) => {
                    warn!("Extraction failed for {}: {:?}", hit.url, e);
                    stats.extraction_failures += 1;
                }
            }
        }

        if stats.interrupted {
            return stats;
        }

        for (hit, text, records) in extracted {
            for record in records {
                stats.records += 1;
                match self.merge(set, &hit.url, &text, &record, round) {
                    MergeOutcome::Created => stats.created += 1,
                    MergeOutcome::Merged {
                        conflicts_opened,
                        candidates_added,
                    } => {
                        stats.merged += 1;
                        stats.conflicts_opened += conflicts_opened;
                        stats.candidates_added += candidates_added;
                    }
                    MergeOutcome::Unchanged => {}
                }
            }
        }

        debug!(
            "Absorbed round {}: {} created, {} merged, {} conflicts opened",
            round, stats.created, stats.merged, stats.conflicts_opened
        );
        stats
    }

    /// Merge one extracted record from `url` into `set`
    ///
    /// Records with equal normalized keys share one evidence id. A field the
    /// record lacks is filled in; an equivalent value only adds the source;
    /// a different value opens a conflict holding both. Once a field is in
    /// conflict every later value joins it as a candidate.
    pub fn merge(&self, set: &mut EvidenceSet, url: &str, text: &str, record: &FactRecord, round: u32) -> MergeOutcome {
        let key = self.synonyms.normalize_key(&record.name, &record.era);
        let id = relicseek_domain::EvidenceId::from_key(&key);

        let Some(existing) = set.get(id) else {
            set.insert(Evidence::new(
                key,
                record.name.clone(),
                url,
                record.facts.clone(),
                clip(text, EXCERPT_CHARS),
                round,
            ));
            return MergeOutcome::Created;
        };

        let mut actions = Vec::new();
        for (field, value) in &record.facts {
            match existing.fact_fields.get(field) {
                None => actions.push(FieldAction::Fill(field.clone(), value.clone())),
                Some(_) if set.conflict(id, field).is_some() => {
                    actions.push(FieldAction::Support(field.clone(), value.clone()))
                }
                Some(current) if self.synonyms.values_equivalent(field, current, value) => {}
                Some(current) => actions.push(FieldAction::Open(
                    field.clone(),
                    current.clone(),
                    existing.field_source(field).to_string(),
                    value.clone(),
                )),
            }
        }
        let new_source = !existing.source_urls.contains(url);

        let mut changed = new_source;
        let mut conflicts_opened = 0;
        let mut candidates_added = 0;

        if let Some(evidence) = set.get_mut(id) {
            evidence.source_urls.insert(url.to_string());
        }

        for action in actions {
            match action {
                FieldAction::Fill(field, value) => {
                    if let Some(evidence) = set.get_mut(id) {
                        evidence.field_sources.insert(field.clone(), url.to_string());
                        evidence.fact_fields.insert(field, value);
                        changed = true;
                    }
                }
                FieldAction::Open(field, current, current_source, value) => {
                    let conflict = set.conflict_entry(id, &field);
                    conflict.add_candidate(candidate(id, current, current_source));
                    conflict.add_candidate(candidate(id, value, url.to_string()));
                    debug!("Conflict opened on {} '{}'", record.name, field);
                    conflicts_opened += 1;
                    changed = true;
                }
                FieldAction::Support(field, value) => {
                    if set.conflict_entry(id, &field).add_candidate(candidate(id, value, url.to_string())) {
                        candidates_added += 1;
                        changed = true;
                    }
                }
            }
        }

        if changed {
            MergeOutcome::Merged {
                conflicts_opened,
                candidates_added,
            }
        } else {
            MergeOutcome::Unchanged
        }
    }
}

fn candidate(evidence_id: relicseek_domain::EvidenceId, value: String, source_url: String) -> CandidateValue {
    CandidateValue {
        credibility: source_score(&source_url),
        value,
        evidence_id,
        source_url,
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
