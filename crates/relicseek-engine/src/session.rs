//! Session state, per-round reports and the session response

use crate::config::SessionConfig;
use crate::error::FailureReason;
use relicseek_domain::{
    Conflict, Evidence, EvidenceSet, Query, QueryAnalysis, ReflectionVerdict, Report, SearchPlan, SearchStep,
};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session is in its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Analyzing the query or planning a round
    Planning,
    /// Running search steps
    Searching,
    /// Fetching pages
    Fetching,
    /// Extracting and merging evidence
    Aggregating,
    /// Recomputing credibility
    Scoring,
    /// Assessing sufficiency
    Reflecting,
    /// Finished with a report
    Done,
    /// Finished without a report
    Failed,
}

impl SessionState {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Planning => "planning",
            SessionState::Searching => "searching",
            SessionState::Fetching => "fetching",
            SessionState::Aggregating => "aggregating",
            SessionState::Scoring => "scoring",
            SessionState::Reflecting => "reflecting",
            SessionState::Done => "done",
            SessionState::Failed => "failed",
        }
    }

    /// Whether the session has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall confidence band of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// Aggregate credibility below 0.5
    Low,
    /// Aggregate credibility below 0.75
    Medium,
    /// Aggregate credibility of 0.75 or more
    High,
}

impl Confidence {
    /// Band for an aggregate credibility
    pub fn from_score(score: f64) -> Self {
        if score < 0.5 {
            Confidence::Low
        } else if score < 0.75 {
            Confidence::Medium
        } else {
            Confidence::High
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headline numbers of an evidence set
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSummary {
    /// Mean credibility of all records
    pub quality_score: f64,
    /// Band of `quality_score`
    pub confidence: Confidence,
    /// Open conflicts
    pub open_conflicts: Vec<Conflict>,
    /// Number of records
    pub evidence_count: usize,
    /// Distinct source URLs
    pub source_count: usize,
}

impl EvidenceSummary {
    /// Summarize a set
    pub fn of(set: &EvidenceSet) -> Self {
        let quality_score = set.aggregate_credibility();
        Self {
            quality_score,
            confidence: Confidence::from_score(quality_score),
            open_conflicts: set.conflicts().cloned().collect(),
            evidence_count: set.len(),
            source_count: set.source_count(),
        }
    }
}

/// What happened in one completed round
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundReport {
    /// Round number (>= 1)
    pub round: u32,
    /// Queries searched
    pub queries: Vec<String>,
    /// Steps whose search failed
    pub failed_steps: usize,
    /// Hits returned across all steps
    pub hits: usize,
    /// Pages fetched successfully
    pub fetched: usize,
    /// Pages that failed to fetch
    pub fetch_failures: usize,
    /// Pages whose extraction failed
    pub extraction_failures: usize,
    /// Records created this round
    pub evidence_created: usize,
    /// Records updated this round
    pub evidence_merged: usize,
    /// Conflicts opened this round
    pub conflicts_opened: usize,
    /// Aggregate credibility after scoring
    pub quality_score: f64,
    /// Verdict reached at the end of the round
    pub verdict: Option<ReflectionVerdict>,
    /// Time spent in the round
    pub elapsed: Duration,
}

impl RoundReport {
    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        let verdict = match &self.verdict {
            Some(v) if v.sufficient => "sufficient".to_string(),
            Some(v) => format!("{} missing", v.missing_aspects.len()),
            None => "no verdict".to_string(),
        };
        format!(
            "round {}: {} queries ({} failed), {} hits, {} pages, +{} evidence, {} merged, {} conflicts, quality {:.2}, {}",
            self.round,
            self.queries.len(),
            self.failed_steps,
            self.hits,
            self.fetched,
            self.evidence_created,
            self.evidence_merged,
            self.conflicts_opened,
            self.quality_score,
            verdict
        )
    }
}

/// Details of a failed session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    /// Why it failed
    pub reason: FailureReason,
    /// Last round that completed (0 if none)
    pub last_completed_round: u32,
    /// Summary of whatever evidence was committed
    pub partial_evidence_summary: EvidenceSummary,
}

/// A request to research one query
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// Raw query text
    pub query: String,
    /// Overrides the engine's default configuration
    pub config: Option<SessionConfig>,
}

impl SessionRequest {
    /// Request with the engine's default configuration
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            config: None,
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// Outcome of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionResponse {
    /// Whether the session reached `Done`
    pub success: bool,
    /// Session id
    pub session_id: SessionId,
    /// Raw query text
    pub query: String,
    /// Query analysis, if planning got that far
    pub analysis: Option<QueryAnalysis>,
    /// Plans executed, one per round
    pub strategy: Vec<SearchPlan>,
    /// Headline numbers of the committed evidence
    pub evidence_summary: EvidenceSummary,
    /// Committed evidence, most credible first
    pub evidence: Vec<Evidence>,
    /// Final report (`Done` only)
    pub report: Option<Report>,
    /// Failure details (`Failed` only)
    pub failure: Option<SessionFailure>,
    /// Per-round reports
    pub rounds: Vec<RoundReport>,
    /// Wall-clock time of the session
    pub elapsed: Duration,
}

/// Mutable state of one running session
///
/// Owned by a single task for the whole run.
#[derive(Debug)]
pub struct Session {
    /// Session id
    pub id: SessionId,
    /// Raw query text
    pub query_text: String,
    /// Validated configuration
    pub config: SessionConfig,
    /// Current state
    pub state: SessionState,
    /// Analyzed query (set after the first planning step)
    pub query: Option<Query>,
    /// Committed evidence
    pub evidence: EvidenceSet,
    /// Plans executed so far
    pub plans: Vec<SearchPlan>,
    /// Every step executed so far
    pub executed_steps: Vec<SearchStep>,
    /// URLs already fetched in earlier rounds
    pub fetched_urls: BTreeSet<String>,
    /// Most recent verdicts, oldest first
    pub verdicts: VecDeque<ReflectionVerdict>,
    /// Completed round reports
    pub rounds: Vec<RoundReport>,
    /// Final report
    pub report: Option<Report>,
    /// Failure details
    pub failure: Option<SessionFailure>,
    started: Instant,
}

impl Session {
    /// Start a session in the planning state
    pub fn new(query_text: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            id: SessionId::new(),
            query_text: query_text.into(),
            config,
            state: SessionState::Planning,
            query: None,
            evidence: EvidenceSet::new(),
            plans: Vec::new(),
            executed_steps: Vec::new(),
            fetched_urls: BTreeSet::new(),
            verdicts: VecDeque::new(),
            rounds: Vec::new(),
            report: None,
            failure: None,
            started: Instant::now(),
        }
    }

    /// Rounds that ran through scoring
    pub fn completed_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }

    /// Time since the session started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Remember a verdict, keeping at most `memory_window_size`
    pub fn remember(&mut self, verdict: ReflectionVerdict) {
        self.verdicts.push_back(verdict);
        while self.verdicts.len() > self.config.memory_window_size.max(1) {
            self.verdicts.pop_front();
        }
    }

    /// Latest verdict
    pub fn last_verdict(&self) -> Option<&ReflectionVerdict> {
        self.verdicts.back()
    }

    /// End in `Failed`
    pub fn fail(&mut self, reason: FailureReason) {
        self.failure = Some(SessionFailure {
            reason,
            last_completed_round: self.completed_rounds(),
            partial_evidence_summary: EvidenceSummary::of(&self.evidence),
        });
        self.state = SessionState::Failed;
    }

    /// End in `Done`
    pub fn finish(&mut self, report: Report) {
        self.report = Some(report);
        self.state = SessionState::Done;
    }

    /// Consume the session into its response
    pub fn into_response(self) -> SessionResponse {
        let elapsed = self.elapsed();
        let success = self.state == SessionState::Done;
        SessionResponse {
            success,
            session_id: self.id,
            evidence_summary: EvidenceSummary::of(&self.evidence),
            evidence: self.evidence.ranked().into_iter().cloned().collect(),
            query: self.query_text,
            analysis: self.query.map(|q| q.analysis),
            strategy: self.plans,
            report: if success { self.report } else { None },
            failure: self.failure,
            rounds: self.rounds,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CancelReason;

    #[test]
    fn test_confidence_bands() {
        assert_eq!(Confidence::from_score(0.2), Confidence::Low);
        assert_eq!(Confidence::from_score(0.5), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.75), Confidence::High);
    }

    #[test]
    fn test_verdict_window() {
        let config = SessionConfig {
            memory_window_size: 2,
            ..Default::default()
        };
        let mut session = Session::new("q", config);
        for i in 0..4 {
            session.remember(ReflectionVerdict::insufficient(format!("v{}", i)));
        }
        assert_eq!(session.verdicts.len(), 2);
        assert_eq!(session.verdicts[0].rationale, "v2");
        assert_eq!(session.last_verdict().unwrap().rationale, "v3");
    }

    #[test]
    fn test_failed_response_has_no_report() {
        let mut session = Session::new("q", SessionConfig::default());
        session.report = Some(Report::default());
        session.fail(FailureReason::Cancelled(CancelReason::User));

        let response = session.into_response();
        assert!(!response.success);
        assert!(response.report.is_none());
        let failure = response.failure.unwrap();
        assert_eq!(failure.last_completed_round, 0);
        assert_eq!(failure.partial_evidence_summary.evidence_count, 0);
    }

    #[test]
    fn test_round_summary() {
        let report = RoundReport {
            round: 2,
            queries: vec!["a".into(), "b".into()],
            quality_score: 0.81,
            verdict: Some(ReflectionVerdict::new(true, vec![], 0.9)),
            ..Default::default()
        };
        let line = report.summary();
        assert!(line.starts_with("round 2: 2 queries"));
        assert!(line.ends_with("quality 0.81, sufficient"));
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
