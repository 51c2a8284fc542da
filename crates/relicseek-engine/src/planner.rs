//! Query planning
//!
//! The planner reads the query once, then turns each round's verdict into
//! the next set of search steps.

use crate::calls::{CallError, PortCaller};
use crate::config::SessionConfig;
use crate::error::PlanningError;
use crate::parser::{parse_analysis, parse_terms};
use crate::prompt::{PromptLibrary, PromptName};
use crate::registry::{Capability, CapabilityRegistry};
use relicseek_domain::normalize::normalize_text;
use relicseek_domain::{ModelError, Query, QueryType, ReflectionVerdict, SearchPlan, SearchStep};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Words that already keep a search on cultural relics
const RELIC_KEYWORDS: &[&str] = &["文物", "古代", "历史", "博物馆", "文化", "艺术", "artifact", "relic", "museum"];

/// Facets of a relic worth a dedicated search, tried in order once the
/// reflection stops naming anything new
const RESEARCH_ANGLES: &[&str] = &[
    "年代",
    "出土",
    "材质",
    "尺寸",
    "工艺",
    "纹饰",
    "铭文",
    "用途",
    "收藏",
    "历史背景",
    "考古发现",
    "学术研究",
    "艺术风格",
    "文化价值",
    "流传经历",
    "保护修复",
];

/// Produces the query analysis and the per-round search plans
pub struct QueryPlanner {
    models: Arc<CapabilityRegistry>,
    prompts: Arc<PromptLibrary>,
}

impl QueryPlanner {
    /// Create a planner
    pub fn new(models: Arc<CapabilityRegistry>, prompts: Arc<PromptLibrary>) -> Self {
        Self { models, prompts }
    }

    /// Analyze the raw query text
    pub(crate) async fn analyze(&self, text: &str, caller: &PortCaller) -> Result<Query, PlanningError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlanningError::EmptyQuery);
        }

        let prompt = self
            .prompts
            .render(PromptName::QueryAnalysis, &[("query", text)])
            .map_err(|e| PlanningError::Prompt(e.to_string()))?;
        let model = self.models.resolve(Capability::QueryAnalysis);
        let system = self.prompts.system().to_string();

        let response = caller
            .run(move || model.complete_structured(&prompt, &system, "query analysis JSON object"))
            .await
            .map_err(|e| match e {
                CallError::Port(e) => PlanningError::Model(e),
                CallError::TimedOut => PlanningError::Model(ModelError::timeout("query analysis timed out")),
                CallError::Crashed(msg) => PlanningError::Model(ModelError::unavailable(msg)),
                CallError::Interrupted => PlanningError::Interrupted,
            })?;

        let mut analysis = parse_analysis(&response).map_err(PlanningError::InvalidAnalysis)?;
        analysis.entities = dedup_phrases(analysis.entities);

        info!(
            "Query analyzed: complexity={}, type={}, entities={:?}",
            analysis.complexity, analysis.query_type, analysis.entities
        );
        Ok(Query::new(text, analysis))
    }

    /// Plan one round
    ///
    /// Round 1 searches every entity (plus a joint step for comparisons).
    /// Later rounds search one step per missing aspect of `prior`, under the
    /// entity the aspect names. Steps whose keywords cover an executed
    /// refinement step (or repeat a round-1 step) are dropped; when that
    /// leaves nothing, the round searches the anchor under a research angle
    /// not yet covered.
    pub(crate) async fn plan(
        &self,
        query: &Query,
        prior: Option<&ReflectionVerdict>,
        round: u32,
        executed: &[SearchStep],
        config: &SessionConfig,
        caller: &PortCaller,
    ) -> Result<SearchPlan, PlanningError> {
        let candidates = if round <= 1 {
            self.initial_steps(query, config, caller).await?
        } else {
            refinement_steps(query, prior, round)
        };

        let mut steps: Vec<SearchStep> = Vec::new();
        for step in candidates {
            if step.keywords.is_empty() || is_redundant(&step, executed) {
                continue;
            }
            if steps.iter().any(|s| s.keywords == step.keywords) {
                continue;
            }
            steps.push(step);
        }

        if steps.is_empty() && round > 1 {
            match narrowing_step(query, prior, round, executed) {
                Some(step) => {
                    debug!("Round {}: every aspect already searched, narrowing to '{}'", round, step.query_string());
                    steps.push(step);
                }
                None => warn!("Round {}: no unsearched angle left for '{}'", round, query.anchor()),
            }
        }

        info!("Round {} plan: {} step(s)", round, steps.len());
        Ok(SearchPlan::new(round, steps))
    }

    async fn initial_steps(
        &self,
        query: &Query,
        config: &SessionConfig,
        caller: &PortCaller,
    ) -> Result<Vec<SearchStep>, PlanningError> {
        let facets: Vec<String> = if query.analysis.entities.is_empty() {
            vec![query.text.clone()]
        } else {
            query.analysis.entities.clone()
        };

        let mut steps = Vec::new();
        for facet in &facets {
            let related = self.related_terms(query, facet, config, caller).await?;

            let mut keywords = vec![facet.clone()];
            if let Some(hint) = topic_hint(facet, config) {
                keywords.push(hint);
            }
            keywords.extend(related);
            steps.push(SearchStep::new(keywords, facet.clone(), 1));
        }

        if query.analysis.query_type == QueryType::Comparison && facets.len() >= 2 {
            let mut keywords = facets.clone();
            if let Some(hint) = topic_hint(&facets.join(" "), config) {
                keywords.push(hint);
            }
            steps.push(SearchStep::new(keywords, "comparison", 1));
        }
        Ok(steps)
    }

    /// Related terms for one facet
    ///
    /// Failures only cost the extra terms; interruption still propagates.
    async fn related_terms(
        &self,
        query: &Query,
        facet: &str,
        config: &SessionConfig,
        caller: &PortCaller,
    ) -> Result<Vec<String>, PlanningError> {
        if config.max_related_terms == 0 {
            return Ok(Vec::new());
        }

        let max_terms = config.max_related_terms.to_string();
        let prompt = match self.prompts.render(
            PromptName::RelatedTerms,
            &[("query", query.text.as_str()), ("facet", facet), ("max_terms", max_terms.as_str())],
        ) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!("Related terms prompt failed: {}", e);
                return Ok(Vec::new());
            }
        };
        let model = self.models.resolve(Capability::RelatedTerms);
        let system = self.prompts.system().to_string();

        match caller.run(move || model.complete(&prompt, &system)).await {
            Ok(response) => {
                let facet_norm = normalize_text(facet);
                Ok(parse_terms(&response)
                    .into_iter()
                    .filter(|t| normalize_text(t) != facet_norm)
                    .take(config.max_related_terms)
                    .collect())
            }
            Err(CallError::Interrupted) => Err(PlanningError::Interrupted),
            Err(e) => {
                warn!("Related terms for '{}' unavailable: {:?}", facet, e);
                Ok(Vec::new())
            }
        }
    }
}

fn topic_hint(facet: &str, config: &SessionConfig) -> Option<String> {
    let hint = config.topic_hint.trim();
    if hint.is_empty() {
        return None;
    }
    let lowered = facet.to_lowercase();
    if lowered.contains(hint) || RELIC_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return None;
    }
    Some(hint.to_string())
}

fn refinement_steps(query: &Query, prior: Option<&ReflectionVerdict>, round: u32) -> Vec<SearchStep> {
    let Some(verdict) = prior else {
        return Vec::new();
    };
    dedup_phrases(verdict.missing_aspects.clone())
        .into_iter()
        .map(|aspect| {
            let mut keywords = aspect_subjects(query, &aspect);
            keywords.push(aspect.clone());
            SearchStep::new(keywords, aspect, round)
        })
        .collect()
}

/// Entities a missing aspect should be searched under
///
/// The entities the aspect names; otherwise every entity of a comparison,
/// otherwise the anchor.
fn aspect_subjects(query: &Query, aspect: &str) -> Vec<String> {
    let aspect_norm = normalize_text(aspect);
    let entities = &query.analysis.entities;

    let named: Vec<String> = entities
        .iter()
        .filter(|e| {
            let norm = normalize_text(e);
            !norm.is_empty() && aspect_norm.contains(&norm)
        })
        .cloned()
        .collect();
    if !named.is_empty() {
        return named;
    }
    if query.analysis.query_type == QueryType::Comparison && entities.len() >= 2 {
        return entities.clone();
    }
    vec![query.anchor().to_string()]
}

/// Round-1 steps are the broad baseline later rounds narrow, so only exact
/// repeats of them count; refinement steps also block anything covering them.
fn is_redundant(step: &SearchStep, executed: &[SearchStep]) -> bool {
    let tokens = step.tokens();
    executed.iter().any(|previous| {
        let covered = if previous.round <= 1 {
            previous.tokens() == tokens
        } else {
            step.is_superset_of(previous)
        };
        if covered {
            debug!("Skipping '{}': covers executed '{}'", step.query_string(), previous.query_string());
        }
        covered
    })
}

/// One step searching a subject under an angle nothing has covered yet
///
/// Secondary entities paired with the missing aspects come first, then the
/// anchor paired with each entry of [`RESEARCH_ANGLES`].
fn narrowing_step(
    query: &Query,
    prior: Option<&ReflectionVerdict>,
    round: u32,
    executed: &[SearchStep],
) -> Option<SearchStep> {
    let anchor = query.anchor().to_string();
    let aspects = prior
        .map(|verdict| dedup_phrases(verdict.missing_aspects.clone()))
        .unwrap_or_default();

    let aspects = &aspects;
    let secondary = query
        .analysis
        .entities
        .iter()
        .filter(|e| **e != anchor)
        .flat_map(move |entity| {
            aspects
                .iter()
                .map(move |aspect| SearchStep::new([entity.clone(), aspect.clone()], aspect.clone(), round))
        });
    let angles = RESEARCH_ANGLES
        .iter()
        .map(|angle| SearchStep::new([anchor.clone(), angle.to_string()], *angle, round));

    secondary.chain(angles).find(|step| !is_redundant(step, executed))
}

fn dedup_phrases(phrases: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for phrase in phrases {
        let phrase = phrase.trim().to_string();
        let norm = normalize_text(&phrase);
        if norm.is_empty() || seen.contains(&norm) {
            continue;
        }
        seen.push(norm);
        out.push(phrase);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicseek_domain::{Complexity, QueryAnalysis};
    use std::collections::BTreeSet;

    fn query(entities: &[&str], query_type: QueryType) -> Query {
        Query::new(
            "question",
            QueryAnalysis {
                complexity: Complexity::Moderate,
                query_type,
                entities: entities.iter().map(|e| e.to_string()).collect(),
                summary: String::new(),
            },
        )
    }

    #[test]
    fn test_topic_hint_skipped_when_relic_word_present() {
        let config = SessionConfig::default();
        assert_eq!(topic_hint("马踏飞燕", &config), Some("文物".to_string()));
        assert_eq!(topic_hint("汉代文物", &config), None);
        assert_eq!(topic_hint("Palace Museum bronzes", &config), None);

        let no_hint = SessionConfig {
            topic_hint: String::new(),
            ..Default::default()
        };
        assert_eq!(topic_hint("马踏飞燕", &no_hint), None);
    }

    #[test]
    fn test_refinement_uses_anchor_and_aspect() {
        let q = query(&["马踏飞燕"], QueryType::Entity);
        let verdict = ReflectionVerdict::new(false, vec!["出土时间".into(), "出土时间 ".into(), "收藏地".into()], 0.3);
        let steps = refinement_steps(&q, Some(&verdict), 2);

        assert_eq!(steps.len(), 2);
        assert!(steps[0].keywords.contains("马踏飞燕"));
        assert!(steps[0].keywords.contains("出土时间"));
        assert_eq!(steps[0].round, 2);
        assert_eq!(steps[1].purpose, "收藏地");
    }

    #[test]
    fn test_refinement_without_verdict_is_empty() {
        let q = query(&["马踏飞燕"], QueryType::Entity);
        assert!(refinement_steps(&q, None, 2).is_empty());
        let sufficient = ReflectionVerdict::new(true, vec![], 0.9);
        assert!(refinement_steps(&q, Some(&sufficient), 2).is_empty());
    }

    #[test]
    fn test_refinement_searches_the_entity_the_aspect_names() {
        let q = query(&["后母戊鼎", "四羊方尊"], QueryType::Comparison);
        let verdict = ReflectionVerdict::new(false, vec!["四羊方尊的出土地点".into(), "尺寸".into()], 0.3);
        let steps = refinement_steps(&q, Some(&verdict), 2);

        assert!(steps[0].keywords.contains("四羊方尊"));
        assert!(!steps[0].keywords.contains("后母戊鼎"));
        assert!(steps[1].keywords.contains("后母戊鼎"));
        assert!(steps[1].keywords.contains("四羊方尊"));
    }

    #[test]
    fn test_round_one_steps_only_block_exact_repeats() {
        let baseline = vec![SearchStep::new(["马踏飞燕"], "马踏飞燕", 1)];
        let narrower = SearchStep::new(["马踏飞燕", "出土时间"], "出土时间", 2);
        assert!(!is_redundant(&narrower, &baseline));
        assert!(is_redundant(&SearchStep::new(["马踏飞燕"], "again", 2), &baseline));

        let refined = vec![narrower.clone()];
        let wider = SearchStep::new(["马踏飞燕", "出土时间", "铜奔马"], "出土时间", 3);
        assert!(is_redundant(&wider, &refined));
    }

    #[test]
    fn test_repeated_aspect_narrows_to_unsearched_angle() {
        let q = query(&["马踏飞燕"], QueryType::Entity);
        let verdict = ReflectionVerdict::new(false, vec!["出土时间".into()], 0.3);
        let mut executed = vec![
            SearchStep::new(["马踏飞燕", "文物", "铜奔马"], "马踏飞燕", 1),
            SearchStep::new(["马踏飞燕", "出土时间"], "出土时间", 2),
        ];

        assert!(refinement_steps(&q, Some(&verdict), 3)
            .iter()
            .all(|step| is_redundant(step, &executed)));

        let step = narrowing_step(&q, Some(&verdict), 3, &executed).unwrap();
        assert_eq!(step.query_string(), "年代 马踏飞燕");
        assert_eq!(step.round, 3);

        executed.push(step);
        let next = narrowing_step(&q, None, 4, &executed).unwrap();
        assert!(next.keywords.contains("出土"));
    }

    #[test]
    fn test_narrowing_prefers_secondary_entities() {
        let q = query(&["后母戊鼎", "四羊方尊"], QueryType::Comparison);
        let verdict = ReflectionVerdict::new(false, vec!["铭文".into()], 0.3);
        let executed = vec![SearchStep::new(["后母戊鼎", "四羊方尊", "铭文"], "铭文", 2)];

        let step = narrowing_step(&q, Some(&verdict), 3, &executed).unwrap();
        assert_eq!(step.keywords, BTreeSet::from(["四羊方尊".to_string(), "铭文".to_string()]));
    }

    #[test]
    fn test_dedup_phrases() {
        let out = dedup_phrases(vec!["Bronze".into(), " bronze".into(), "".into(), "青铜".into()]);
        assert_eq!(out, vec!["Bronze", "青铜"]);
    }
}
