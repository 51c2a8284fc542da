//! Evidence records, conflicts and the per-session evidence set

use crate::normalize::{normalize_text, SynonymTable};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Namespace for name-based evidence ids
const EVIDENCE_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c52_8e0d_4b7a_9c41_d2e5_f07b_3a18);

/// Identifier of an evidence record
///
/// A UUIDv5 over the normalized evidence key, so the same artifact extracted
/// from any page always lands on the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvidenceId(u128);

impl EvidenceId {
    /// Derive the id for a normalized key
    ///
    /// # Examples
    ///
    /// ```
    /// use relicseek_domain::EvidenceId;
    ///
    /// let a = EvidenceId::from_key("houmuwu ding|shang");
    /// let b = EvidenceId::from_key("houmuwu ding|shang");
    /// assert_eq!(a, b);
    /// ```
    pub fn from_key(key: &str) -> Self {
        Self(Uuid::new_v5(&EVIDENCE_NAMESPACE, key.as_bytes()).as_u128())
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// First eight hex digits, for tables
    pub fn short(&self) -> String {
        self.to_string().chars().take(8).collect()
    }
}

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_u128(self.0))
    }
}

/// A deduplicated fact record about the query subject
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    /// Deterministic id derived from `key`
    pub id: EvidenceId,

    /// Normalized key (canonical name + era)
    pub key: String,

    /// Display name as first extracted
    pub name: String,

    /// URL of the first contributing source
    pub canonical_url: String,

    /// Every URL that contributed to this record
    pub source_urls: BTreeSet<String>,

    /// Fact field name to value
    pub fact_fields: BTreeMap<String, String>,

    /// Fact field name to the URL that supplied the kept value
    pub field_sources: BTreeMap<String, String>,

    /// Excerpt of the first source's text
    pub extracted_text: String,

    /// Trust weight in [0, 1], maintained by the scorer
    pub credibility: f64,

    /// Round in which the record was created
    pub first_seen_round: u32,
}

impl Evidence {
    /// Create a record from a single source
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        fact_fields: BTreeMap<String, String>,
        extracted_text: impl Into<String>,
        round: u32,
    ) -> Self {
        let key = key.into();
        let url = url.into();
        let field_sources = fact_fields
            .keys()
            .map(|field| (field.clone(), url.clone()))
            .collect();

        Self {
            id: EvidenceId::from_key(&key),
            key,
            name: name.into(),
            canonical_url: url.clone(),
            source_urls: BTreeSet::from([url]),
            fact_fields,
            field_sources,
            extracted_text: extracted_text.into(),
            credibility: 0.0,
            first_seen_round: round,
        }
    }

    /// URL that supplied a field's kept value
    pub fn field_source(&self, field: &str) -> &str {
        self.field_sources
            .get(field)
            .map(String::as_str)
            .unwrap_or(self.canonical_url.as_str())
    }
}

/// One supported value of a conflicting field
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateValue {
    /// The value as the source stated it
    pub value: String,

    /// Evidence the conflict belongs to
    pub evidence_id: EvidenceId,

    /// Source that supports this value
    pub source_url: String,

    /// Credibility of the supporting source
    pub credibility: f64,
}

/// A disagreement between sources on one field of one evidence record
///
/// Holds at least two non-equivalent values.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    /// Evidence the conflict belongs to
    pub evidence_id: EvidenceId,

    /// Disputed field
    pub field: String,

    /// Competing values with their support
    pub candidates: Vec<CandidateValue>,
}

impl Conflict {
    /// Create an empty conflict for a field
    pub fn new(evidence_id: EvidenceId, field: impl Into<String>) -> Self {
        Self {
            evidence_id,
            field: field.into(),
            candidates: Vec::new(),
        }
    }

    /// Add a candidate unless the same value from the same source is present
    ///
    /// Returns `true` when the candidate was added.
    pub fn add_candidate(&mut self, candidate: CandidateValue) -> bool {
        let normalized = normalize_text(&candidate.value);
        let duplicate = self
            .candidates
            .iter()
            .any(|c| c.source_url == candidate.source_url && normalize_text(&c.value) == normalized);
        if duplicate {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    /// Number of distinct values under the equivalence policy
    pub fn distinct_values(&self, table: &SynonymTable) -> usize {
        let mut representatives: Vec<&str> = Vec::new();
        for candidate in &self.candidates {
            let seen = representatives
                .iter()
                .any(|rep| table.values_equivalent(&self.field, rep, &candidate.value));
            if !seen {
                representatives.push(&candidate.value);
            }
        }
        representatives.len()
    }

    /// Candidate values as stated, without exact repeats
    pub fn values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = Vec::new();
        for candidate in &self.candidates {
            if !values.contains(&candidate.value.as_str()) {
                values.push(&candidate.value);
            }
        }
        values
    }
}

/// All evidence and open conflicts gathered in one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvidenceSet {
    evidence: BTreeMap<EvidenceId, Evidence>,
    conflicts: BTreeMap<(EvidenceId, String), Conflict>,
}

impl EvidenceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of evidence records
    pub fn len(&self) -> usize {
        self.evidence.len()
    }

    /// Whether there is no evidence
    pub fn is_empty(&self) -> bool {
        self.evidence.is_empty()
    }

    /// Look up a record
    pub fn get(&self, id: EvidenceId) -> Option<&Evidence> {
        self.evidence.get(&id)
    }

    /// Look up a record mutably
    pub fn get_mut(&mut self, id: EvidenceId) -> Option<&mut Evidence> {
        self.evidence.get_mut(&id)
    }

    /// Whether a record exists
    pub fn contains(&self, id: EvidenceId) -> bool {
        self.evidence.contains_key(&id)
    }

    /// Insert a record, replacing any record with the same id
    pub fn insert(&mut self, evidence: Evidence) {
        self.evidence.insert(evidence.id, evidence);
    }

    /// Records in id order
    pub fn iter(&self) -> impl Iterator<Item = &Evidence> {
        self.evidence.values()
    }

    /// Records in id order, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Evidence> {
        self.evidence.values_mut()
    }

    /// Open conflict on a field, if any
    pub fn conflict(&self, id: EvidenceId, field: &str) -> Option<&Conflict> {
        self.conflicts.get(&(id, field.to_string()))
    }

    /// Open conflict on a field, created empty when missing
    pub fn conflict_entry(&mut self, id: EvidenceId, field: &str) -> &mut Conflict {
        self.conflicts
            .entry((id, field.to_string()))
            .or_insert_with(|| Conflict::new(id, field))
    }

    /// All open conflicts in (evidence id, field) order
    pub fn conflicts(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts.values()
    }

    /// All open conflicts, mutably
    pub fn conflicts_mut(&mut self) -> impl Iterator<Item = &mut Conflict> {
        self.conflicts.values_mut()
    }

    /// Number of open conflicts across all records
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Number of open conflicts touching one record
    pub fn conflicts_for(&self, id: EvidenceId) -> usize {
        self.conflicts.keys().filter(|(eid, _)| *eid == id).count()
    }

    /// Distinct source URLs across all records
    pub fn source_count(&self) -> usize {
        self.evidence
            .values()
            .flat_map(|e| e.source_urls.iter())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Mean credibility of all records, 0.0 when empty
    pub fn aggregate_credibility(&self) -> f64 {
        if self.evidence.is_empty() {
            return 0.0;
        }
        let total: f64 = self.evidence.values().map(|e| e.credibility).sum();
        total / self.evidence.len() as f64
    }

    /// Records ordered by credibility, most credible first
    pub fn ranked(&self) -> Vec<&Evidence> {
        let mut ranked: Vec<&Evidence> = self.evidence.values().collect();
        ranked.sort_by(|a, b| {
            b.credibility
                .partial_cmp(&a.credibility)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }
}
