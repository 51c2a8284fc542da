//! Reflection controller
//!
//! Drives one session through planning, searching, fetching, aggregating,
//! scoring and reflecting until the evidence is sufficient, the round
//! limit is reached, the time budget runs out, or something fails.
//!
//! Cancellation and the time budget are checked on entry to every state.
//! Work from a round that does not reach scoring is discarded.

use crate::aggregator::EvidenceAggregator;
use crate::calls::{CallError, PortCaller};
use crate::config::SessionConfig;
use crate::error::{CancelReason, ConfigError, FailureReason, PlanningError};
use crate::parser::parse_verdict;
use crate::planner::QueryPlanner;
use crate::prompt::{conflict_lines, evidence_lines, history_lines, PromptLibrary, PromptName};
use crate::registry::{Capability, Ports};
use crate::scorer::CredibilityScorer;
use crate::session::{RoundReport, Session, SessionRequest, SessionResponse, SessionState};
use relicseek_domain::traits::SearchRequest;
use relicseek_domain::{
    FetchError, ModelError, Query, RawHit, ReflectionVerdict, Report, SearchError, SearchPlan,
};
use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Evidence records shown to the model when it reflects
const REFLECTION_EVIDENCE_LIMIT: usize = 20;

/// How a session leaves its loop
#[derive(Debug)]
enum Stop {
    /// Stop searching and write the report
    Finish,
    /// End without a report
    Fail(FailureReason),
}

/// Runs research sessions against a fixed set of ports
pub struct ResearchEngine {
    ports: Ports,
    prompts: Arc<PromptLibrary>,
    defaults: SessionConfig,
    scorer: CredibilityScorer,
}

impl ResearchEngine {
    /// Create an engine
    pub fn new(ports: Ports, prompts: PromptLibrary, defaults: SessionConfig) -> Self {
        Self {
            ports,
            prompts: Arc::new(prompts),
            defaults,
            scorer: CredibilityScorer::new(),
        }
    }

    /// Configuration used when a request carries none
    pub fn defaults(&self) -> &SessionConfig {
        &self.defaults
    }

    /// The ports this engine talks to
    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    /// The loaded prompt templates
    pub fn prompts(&self) -> &PromptLibrary {
        &self.prompts
    }

    /// Research one query
    ///
    /// Returns `Err` only when the configuration is invalid; every other
    /// outcome, including failure and cancellation, is a response.
    pub async fn search(
        &self,
        request: SessionRequest,
        cancel: CancellationToken,
    ) -> Result<SessionResponse, ConfigError> {
        let config = request.config.unwrap_or_else(|| self.defaults.clone());
        config.validate()?;

        let mut session = Session::new(request.query, config);
        info!("Session {} started: {}", session.id, session.query_text);

        let run = Run::new(self, &session.config, cancel);
        run.execute(&mut session).await;

        info!(
            "Session {} finished: {} after {} round(s) in {:.1}s",
            session.id,
            session.state,
            session.completed_rounds(),
            session.elapsed().as_secs_f64()
        );
        Ok(session.into_response())
    }
}

/// Per-session collaborators
struct Run<'a> {
    engine: &'a ResearchEngine,
    planner: QueryPlanner,
    aggregator: EvidenceAggregator,
    caller: PortCaller,
    cancel: CancellationToken,
    deadline: Instant,
}

impl<'a> Run<'a> {
    fn new(engine: &'a ResearchEngine, config: &SessionConfig, cancel: CancellationToken) -> Self {
        let deadline = Instant::now() + config.max_execution_time();
        let models = Arc::clone(&engine.ports.models);
        Self {
            engine,
            planner: QueryPlanner::new(Arc::clone(&models), Arc::clone(&engine.prompts)),
            aggregator: EvidenceAggregator::new(models, Arc::clone(&engine.prompts), Arc::new(config.synonym_table())),
            caller: PortCaller::new(config.timeout(), cancel.clone(), deadline),
            cancel,
            deadline,
        }
    }

    async fn execute(&self, session: &mut Session) {
        let mut round = 1;
        let stop = loop {
            match self.round(session, round).await {
                Ok(()) => round += 1,
                Err(stop) => break stop,
            }
        };

        match stop {
            Stop::Finish => {
                let report = self.synthesize(session).await;
                session.finish(report);
            }
            Stop::Fail(reason) => {
                warn!("Session {} failed: {}", session.id, reason);
                session.fail(reason);
            }
        }
    }

    /// Why the session must stop now, if it must
    fn check(&self, session: &Session) -> Option<Stop> {
        if self.cancel.is_cancelled() {
            return Some(Stop::Fail(FailureReason::Cancelled(CancelReason::User)));
        }
        if Instant::now() >= self.deadline {
            info!(
                "Session {} time budget exhausted after {} round(s)",
                session.id,
                session.completed_rounds()
            );
            return Some(if session.completed_rounds() > 0 {
                Stop::Finish
            } else {
                Stop::Fail(FailureReason::Cancelled(CancelReason::TimeBudget))
            });
        }
        None
    }

    fn enter(&self, session: &mut Session, state: SessionState) -> Result<(), Stop> {
        if let Some(stop) = self.check(session) {
            return Err(stop);
        }
        debug!("Session {}: {} -> {}", session.id, session.state, state);
        session.state = state;
        Ok(())
    }

    /// Stop after a port call was interrupted
    fn interrupted(&self, session: &Session) -> Stop {
        self.check(session)
            .unwrap_or(Stop::Fail(FailureReason::Cancelled(CancelReason::User)))
    }

    async fn round(&self, session: &mut Session, round: u32) -> Result<(), Stop> {
        let started = Instant::now();
        let config = session.config.clone();
        let mut report = RoundReport {
            round,
            ..Default::default()
        };

        // Planning
        self.enter(session, SessionState::Planning)?;
        let query = match session.query.clone() {
            Some(query) => query,
            None => {
                let query = self
                    .planner
                    .analyze(&session.query_text, &self.caller)
                    .await
                    .map_err(|e| self.planning_failed(session, e))?;
                session.query = Some(query.clone());
                query
            }
        };
        let plan = self
            .planner
            .plan(
                &query,
                session.last_verdict(),
                round,
                &session.executed_steps,
                &config,
                &self.caller,
            )
            .await
            .map_err(|e| self.planning_failed(session, e))?;
        if plan.is_empty() {
            if round == 1 {
                return Err(Stop::Fail(FailureReason::Planning(PlanningError::InvalidAnalysis(
                    "no searchable facets".to_string(),
                ))));
            }
            info!("Session {}: nothing new to search in round {}", session.id, round);
            return Err(Stop::Finish);
        }

        // Searching
        self.enter(session, SessionState::Searching)?;
        let results = self.search_all(&plan, &config).await;
        let mut step_hits = Vec::new();
        let mut last_error = None;
        let mut interrupted = false;
        for (query_string, result) in results {
            report.queries.push(query_string.clone());
            match result {
                Ok(hits) => {
                    debug!("'{}' returned {} hit(s)", query_string, hits.len());
                    report.hits += hits.len();
                    step_hits.push(hits);
                }
                Err(CallError::Interrupted) => interrupted = true,
                Err(e) => {
                    let error = match e {
                        CallError::Port(error) => error,
                        CallError::TimedOut => SearchError::unreachable("search timed out"),
                        CallError::Crashed(msg) => SearchError::unreachable(msg),
                        CallError::Interrupted => SearchError::unreachable("interrupted"),
                    };
                    warn!("Search '{}' failed: {}", query_string, error);
                    report.failed_steps += 1;
                    last_error = Some(error);
                }
            }
        }
        session.executed_steps.extend(plan.steps.iter().cloned());
        session.plans.push(plan);
        if interrupted {
            return Err(self.interrupted(session));
        }
        if step_hits.is_empty() {
            return Err(Stop::Fail(FailureReason::Search {
                round,
                last_error: last_error.unwrap_or_else(|| SearchError::unreachable("no search step ran")),
            }));
        }

        // Fetching
        self.enter(session, SessionState::Fetching)?;
        let selected = select_hits(&step_hits, config.max_results_per_query, &session.fetched_urls);
        let Some(fetched) = self.fetch_all(&selected, config.max_concurrent_fetches).await else {
            return Err(self.interrupted(session));
        };
        report.fetched = fetched.values().filter(|r| r.is_ok()).count();
        report.fetch_failures = fetched.len() - report.fetched;

        // Aggregating
        self.enter(session, SessionState::Aggregating)?;
        let mut working = session.evidence.clone();
        let stats = self
            .aggregator
            .absorb(
                &query,
                &selected,
                &fetched,
                &mut working,
                round,
                config.max_concurrent_fetches,
                &self.caller,
            )
            .await;
        if stats.interrupted {
            return Err(self.interrupted(session));
        }
        report.extraction_failures = stats.extraction_failures;
        report.evidence_created = stats.created;
        report.evidence_merged = stats.merged;
        report.conflicts_opened = stats.conflicts_opened;

        // Scoring
        self.enter(session, SessionState::Scoring)?;
        self.engine.scorer.score(&mut working);
        session.evidence = working;
        session.fetched_urls.extend(selected.into_iter().map(|hit| hit.url));
        report.quality_score = session.evidence.aggregate_credibility();
        report.elapsed = started.elapsed();
        session.rounds.push(report);

        // Reflecting
        self.enter(session, SessionState::Reflecting)?;
        let verdict = self.reflect(session, &query, round).await?;
        let quality = session.evidence.aggregate_credibility();
        let sufficient = verdict.sufficient && quality >= config.quality_threshold;

        if let Some(last) = session.rounds.last_mut() {
            last.verdict = Some(verdict.clone());
            last.elapsed = started.elapsed();
            info!("Session {} {}", session.id, last.summary());
        }
        session.remember(verdict);

        if sufficient {
            info!("Session {}: evidence sufficient (quality {:.2})", session.id, quality);
            return Err(Stop::Finish);
        }
        if round >= config.round_limit() {
            info!("Session {}: round limit {} reached", session.id, config.round_limit());
            return Err(Stop::Finish);
        }
        Ok(())
    }

    fn planning_failed(&self, session: &Session, error: PlanningError) -> Stop {
        match error {
            PlanningError::Interrupted => self.interrupted(session),
            other => Stop::Fail(FailureReason::Planning(other)),
        }
    }

    async fn search_all(
        &self,
        plan: &SearchPlan,
        config: &SessionConfig,
    ) -> Vec<(String, Result<Vec<RawHit>, CallError<SearchError>>)> {
        let mut handles = Vec::with_capacity(plan.len());
        for step in &plan.steps {
            let request = SearchRequest {
                query: step.query_string(),
                categories: config.categories.clone(),
                engines: config.engines.clone(),
                language: config.language.clone(),
                limit: config.max_results_per_query,
            };
            let search = Arc::clone(&self.engine.ports.search);
            let caller = self.caller.clone();
            handles.push(tokio::spawn(async move {
                let query = request.query.clone();
                let result = caller.run(move || search.search(&request)).await;
                (query, result)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (step, handle) in plan.steps.iter().zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => results.push((step.query_string(), Err(CallError::Crashed(e.to_string())))),
            }
        }
        results
    }

    /// Fetch every selected hit; `None` if the session was interrupted
    async fn fetch_all(
        &self,
        hits: &[RawHit],
        max_concurrent: usize,
    ) -> Option<BTreeMap<String, Result<String, FetchError>>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(hits.len());

        for hit in hits {
            let url = hit.url.clone();
            let fetch = Arc::clone(&self.engine.ports.fetch);
            let semaphore = Arc::clone(&semaphore);
            let caller = self.caller.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let target = url.clone();
                let result = caller.run(move || fetch.fetch(&target)).await;
                (url, result)
            }));
        }

        let mut fetched = BTreeMap::new();
        let mut interrupted = false;
        for handle in handles {
            let (url, result) = match handle.await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Fetch task failed: {}", e);
                    continue;
                }
            };
            let result = match result {
                Ok(text) => Ok(text),
                Err(CallError::Port(e)) => Err(e),
                Err(CallError::TimedOut) => Err(FetchError::network("fetch timed out")),
                Err(CallError::Crashed(msg)) => Err(FetchError::network(msg)),
                Err(CallError::Interrupted) => {
                    interrupted = true;
                    continue;
                }
            };
            if let Err(e) = &result {
                debug!("Fetch {} failed: {}", url, e);
            }
            fetched.insert(url, result);
        }

        (!interrupted).then_some(fetched)
    }

    async fn reflect(&self, session: &Session, query: &Query, round: u32) -> Result<ReflectionVerdict, Stop> {
        let config = &session.config;
        let evidence = evidence_lines(&session.evidence, REFLECTION_EVIDENCE_LIMIT);
        let conflicts = conflict_lines(&session.evidence);
        let history = history_lines(&session.verdicts, round.saturating_sub(1));
        let round_text = round.to_string();
        let round_limit = config.round_limit().to_string();
        let quality = format!("{:.2}", session.evidence.aggregate_credibility());
        let threshold = format!("{:.2}", config.quality_threshold);

        let prompt = self
            .engine
            .prompts
            .render(
                PromptName::Reflection,
                &[
                    ("query", query.text.as_str()),
                    ("round", round_text.as_str()),
                    ("round_limit", round_limit.as_str()),
                    ("quality_score", quality.as_str()),
                    ("quality_threshold", threshold.as_str()),
                    ("evidence", evidence.as_str()),
                    ("conflicts", conflicts.as_str()),
                    ("history", history.as_str()),
                ],
            )
            .map_err(|e| Stop::Fail(FailureReason::Model(ModelError::invalid_response(e.to_string()))))?;

        let model = self.engine.ports.models.resolve(Capability::SufficiencyAssessment);
        let system = self.engine.prompts.system().to_string();
        let response = match self
            .caller
            .run(move || model.complete_structured(&prompt, &system, "sufficiency verdict JSON object"))
            .await
        {
            Ok(response) => response,
            Err(CallError::Interrupted) => return Err(self.interrupted(session)),
            Err(CallError::Port(e)) => return Err(Stop::Fail(FailureReason::Model(e))),
            Err(CallError::TimedOut) => {
                return Err(Stop::Fail(FailureReason::Model(ModelError::timeout("sufficiency assessment timed out"))))
            }
            Err(CallError::Crashed(msg)) => return Err(Stop::Fail(FailureReason::Model(ModelError::unavailable(msg)))),
        };

        parse_verdict(&response).map_err(|e| Stop::Fail(FailureReason::Model(ModelError::invalid_response(e))))
    }

    /// Final report; falls back to the digest when the synthesizer does not answer in time
    async fn synthesize(&self, session: &Session) -> Report {
        let query = session
            .query
            .clone()
            .unwrap_or_else(|| Query::new(session.query_text.clone(), Default::default()));
        let set = session.evidence.clone();

        let synthesizer = Arc::clone(&self.engine.ports.synthesizer);
        let caller = self.caller.timeout_only();
        let (task_set, task_query) = (set.clone(), query.clone());
        let result = caller
            .run(move || Ok::<Report, Infallible>(synthesizer.synthesize(&task_set, &task_query)))
            .await;

        match result {
            Ok(report) => report,
            Err(e) => {
                warn!("Report synthesis failed ({:?}), using digest", e);
                Report::digest(&set, &query)
            }
        }
    }
}

/// Top hits of every step, in step order, without repeats or already-fetched URLs
fn select_hits(step_hits: &[Vec<RawHit>], per_step: usize, already_fetched: &BTreeSet<String>) -> Vec<RawHit> {
    let mut seen = BTreeSet::new();
    let mut selected = Vec::new();

    for hits in step_hits {
        let mut ranked: Vec<&RawHit> = hits.iter().collect();
        ranked.sort_by_key(|hit| hit.rank);
        for hit in ranked.into_iter().take(per_step) {
            if already_fetched.contains(&hit.url) || !seen.insert(hit.url.clone()) {
                continue;
            }
            selected.push(hit.clone());
        }
    }
    selected
}
