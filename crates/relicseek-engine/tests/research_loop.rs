//! End-to-end sessions against scripted ports

use relicseek_domain::traits::DigestSynthesizer;
use relicseek_domain::{FetchError, ModelErrorReason, RawHit, SearchError};
use relicseek_engine::{
    CancelReason, Capability, CapabilityRegistry, ConfigError, FailureReason, PlanningError, Ports, PromptLibrary,
    ResearchEngine, SessionConfig, SessionRequest,
};
use relicseek_llm::MockProvider;
use relicseek_search::{MockFetcher, MockSearch};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ANALYSIS: &str = "Analyze the following cultural relic research query.";
const RELATED: &str = "Suggest related search terms";
const EXTRACTION: &str = "Extract structured facts";
const REFLECTION: &str = "Assess whether the evidence gathered so far";

const MUSEUM_URL: &str = "https://www.gansumuseum.example/horse";
const WIKI_URL: &str = "https://en.wikipedia.org/wiki/Flying_Horse_of_Gansu";
const BLOG_URL: &str = "https://travel-blog.example.com/gansu";

const HORSE_ANALYSIS: &str =
    r#"{"complexity": "simple", "query_type": "entity", "entities": ["马踏飞燕"], "summary": "材质"}"#;

fn verdict(sufficient: bool, missing: &[&str]) -> String {
    serde_json::json!({
        "sufficient": sufficient,
        "missing_aspects": missing,
        "confidence": if sufficient { 0.9 } else { 0.4 },
        "rationale": "scripted"
    })
    .to_string()
}

fn facts(name: &str, era: &str, fields: &[(&str, &str)]) -> String {
    let facts: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect();
    serde_json::json!([{ "name": name, "era": era, "facts": facts }]).to_string()
}

/// Model answering analysis, related terms and reflection; extraction rules are added per test
fn horse_model(reflection: &[String]) -> MockProvider {
    let mut model = MockProvider::new("[]");
    model.add_response(ANALYSIS, HORSE_ANALYSIS);
    model.add_response(RELATED, r#"["铜奔马", "马超龙雀"]"#);
    model.add_responses(REFLECTION, reflection.to_vec());
    model
}

fn horse_search() -> MockSearch {
    let search = MockSearch::new();
    search.set_default_hits(vec![
        RawHit::new(MUSEUM_URL, "铜奔马 - 甘肃省博物馆", 1),
        RawHit::new(WIKI_URL, "Flying Horse of Gansu", 2),
    ]);
    search
}

fn horse_fetcher() -> MockFetcher {
    let fetcher = MockFetcher::new();
    fetcher.add_page(MUSEUM_URL, "铜奔马，东汉，青铜铸造，1969年出土于甘肃武威雷台汉墓。");
    fetcher.add_page(WIKI_URL, "The Flying Horse of Gansu is a bronze sculpture from the Eastern Han.");
    fetcher
}

fn engine(model: MockProvider, search: MockSearch, fetcher: MockFetcher) -> ResearchEngine {
    let ports = Ports::new(
        CapabilityRegistry::new(Arc::new(model)),
        Arc::new(search),
        Arc::new(fetcher),
        Arc::new(DigestSynthesizer),
    );
    ResearchEngine::new(ports, PromptLibrary::builtin(), test_config(3))
}

fn test_config(rounds: u32) -> SessionConfig {
    SessionConfig {
        verification_rounds: rounds,
        max_iterations: rounds.max(1),
        max_execution_time_secs: 30,
        timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_galloping_horse_sources_corroborate() {
    let mut model = horse_model(&[verdict(true, &[])]);
    model.add_response(MUSEUM_URL, facts("马踏飞燕", "东汉", &[("材质", "青铜"), ("出土地点", "甘肃武威雷台")]));
    model.add_response(
        WIKI_URL,
        facts("Galloping Horse Treading on a Flying Swallow", "Eastern Han", &[("material", "bronze")]),
    );

    let engine = engine(model.clone(), horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("马踏飞燕的材质是什么？"), CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds.len(), 1);
    assert_eq!(response.evidence.len(), 1);

    let horse = &response.evidence[0];
    assert_eq!(horse.source_urls.len(), 2);
    assert_eq!(horse.fact_fields.get("material").unwrap(), "青铜");
    assert_eq!(horse.fact_fields.get("excavation_site").unwrap(), "甘肃武威雷台");
    assert!(response.evidence_summary.open_conflicts.is_empty());
    assert!(horse.credibility > 0.9);

    let report = response.report.unwrap();
    assert!(report.cited_urls.contains(&MUSEUM_URL.to_string()));
    assert!(report.cited_urls.contains(&WIKI_URL.to_string()));
    assert_eq!(model.calls_matching(EXTRACTION), 2);
}

#[tokio::test]
async fn test_round_one_plan_uses_entities_and_related_terms() {
    let model = horse_model(&[verdict(true, &[])]);
    let search = horse_search();
    let engine = engine(model, search.clone(), horse_fetcher());

    let response = engine
        .search(SessionRequest::new("马踏飞燕的材质是什么？"), CancellationToken::new())
        .await
        .unwrap();

    let analysis = response.analysis.unwrap();
    assert_eq!(analysis.entities, vec!["马踏飞燕"]);
    assert_eq!(response.strategy.len(), 1);

    let step = &response.strategy[0].steps[0];
    assert!(step.keywords.contains("马踏飞燕"));
    assert!(step.keywords.contains("文物"));
    assert!(step.keywords.contains("铜奔马"));
    assert_eq!(search.call_count(), 1);
}

#[tokio::test]
async fn test_conflicting_dates_stay_open() {
    let mut model = horse_model(&[verdict(true, &[])]);
    model.add_response(MUSEUM_URL, facts("铜奔马", "东汉", &[("excavation_date", "1969")]));
    model.add_response(WIKI_URL, facts("铜奔马", "东汉", &[("excavation_date", "1983")]));

    let engine = engine(model, horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("铜奔马是哪一年出土的？"), CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    let conflicts = &response.evidence_summary.open_conflicts;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].field, "excavation_date");
    let mut values = conflicts[0].values();
    values.sort();
    assert_eq!(values, vec!["1969", "1983"]);

    let report = response.report.unwrap();
    assert!(report.body.contains("excavation_date disputed"));
}

#[tokio::test]
async fn test_stops_after_exactly_verification_rounds() {
    let reflections = vec![
        verdict(false, &["出土时间"]),
        verdict(false, &["收藏地点"]),
        verdict(false, &["尺寸"]),
        verdict(false, &["工艺"]),
    ];
    let search = horse_search();
    let engine = engine(horse_model(&reflections), search.clone(), horse_fetcher());

    let response = engine
        .search(
            SessionRequest::new("马踏飞燕").with_config(test_config(3)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds.len(), 3);
    assert_eq!(response.strategy.len(), 3);
    assert!(response.report.is_some());

    let queries = search.queries();
    assert!(queries.iter().any(|q| q.contains("马踏飞燕") && q.contains("出土时间")));
    assert!(queries.iter().any(|q| q.contains("马踏飞燕") && q.contains("收藏地点")));
    assert!(!queries.iter().any(|q| q.contains("尺寸")));
}

#[tokio::test]
async fn test_repeated_aspect_still_runs_every_round() {
    let search = horse_search();
    let engine = engine(horse_model(&[verdict(false, &["出土时间"])]), search.clone(), horse_fetcher());

    let response = engine
        .search(
            SessionRequest::new("马踏飞燕").with_config(test_config(4)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds.len(), 4);
    assert_eq!(search.call_count(), 4);

    let queries = search.queries();
    assert_eq!(queries.iter().filter(|q| q.contains("出土时间")).count(), 1);
    assert!(queries.iter().any(|q| q.contains("马踏飞燕") && q.contains("年代")));
}

#[tokio::test]
async fn test_no_missing_aspects_still_runs_every_round() {
    let search = horse_search();
    let engine = engine(horse_model(&[verdict(false, &[])]), search.clone(), horse_fetcher());

    let response = engine
        .search(
            SessionRequest::new("马踏飞燕").with_config(test_config(3)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds.len(), 3);
    assert_eq!(response.strategy.len(), 3);
    assert!(response.strategy[1..].iter().all(|plan| plan.len() == 1));
}

#[tokio::test]
async fn test_low_quality_sufficient_verdict_keeps_searching() {
    let search = MockSearch::new();
    search.set_default_hits(vec![RawHit::new(BLOG_URL, "Gansu trip", 1)]);
    let fetcher = MockFetcher::new();
    fetcher.add_page(BLOG_URL, "We saw the bronze horse.");

    let mut model = horse_model(&[verdict(true, &["收藏地点"])]);
    model.add_response(BLOG_URL, facts("马踏飞燕", "东汉", &[("material", "bronze")]));

    let engine = engine(model, search, fetcher);
    let response = engine
        .search(
            SessionRequest::new("马踏飞燕").with_config(test_config(2)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds.len(), 2);
    assert!(response.evidence_summary.quality_score < 0.7);
}

#[tokio::test]
async fn test_all_searches_failed() {
    let search = horse_search();
    search.fail_all(SearchError::unreachable("connection refused"));
    let engine = engine(horse_model(&[verdict(true, &[])]), search, horse_fetcher());

    let response = engine
        .search(SessionRequest::new("马踏飞燕"), CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    assert!(response.report.is_none());
    let failure = response.failure.unwrap();
    assert!(matches!(failure.reason, FailureReason::Search { round: 1, .. }));
    assert_eq!(failure.last_completed_round, 0);
    assert_eq!(failure.partial_evidence_summary.evidence_count, 0);
}

#[tokio::test]
async fn test_partial_fetch_failure_is_tolerated() {
    let mut model = horse_model(&[verdict(true, &[])]);
    model.add_response(MUSEUM_URL, facts("马踏飞燕", "东汉", &[("material", "青铜")]));
    let fetcher = horse_fetcher();
    fetcher.add_error(WIKI_URL, FetchError::blocked("HTTP 403"));

    let engine = engine(model, horse_search(), fetcher);
    let response = engine
        .search(SessionRequest::new("马踏飞燕"), CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.rounds[0].fetched, 1);
    assert_eq!(response.rounds[0].fetch_failures, 1);
    assert_eq!(response.evidence.len(), 1);
}

#[tokio::test]
async fn test_reflection_failure_fails_session() {
    let mut model = MockProvider::new("[]");
    model.add_response(ANALYSIS, HORSE_ANALYSIS);
    model.add_error(REFLECTION, ModelErrorReason::Unavailable);
    model.add_response(MUSEUM_URL, facts("马踏飞燕", "东汉", &[("material", "青铜")]));

    let engine = engine(model, horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("马踏飞燕"), CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    let failure = response.failure.unwrap();
    assert!(matches!(failure.reason, FailureReason::Model(_)));
    assert_eq!(failure.last_completed_round, 1);
    assert_eq!(failure.partial_evidence_summary.evidence_count, 1);
}

#[tokio::test]
async fn test_analysis_failure_is_planning_error() {
    let mut model = MockProvider::new("[]");
    model.add_error(ANALYSIS, ModelErrorReason::RateLimited);

    let engine = engine(model, horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("马踏飞燕"), CancellationToken::new())
        .await
        .unwrap();

    let failure = response.failure.unwrap();
    assert!(matches!(failure.reason, FailureReason::Planning(PlanningError::Model(_))));
    assert!(response.analysis.is_none());
}

#[tokio::test]
async fn test_empty_query_fails_planning() {
    let engine = engine(horse_model(&[]), horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("   "), CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(
        response.failure.unwrap().reason,
        FailureReason::Planning(PlanningError::EmptyQuery)
    ));
}

#[tokio::test]
async fn test_cancellation_mid_search() {
    let search = horse_search().with_latency(Duration::from_millis(500));
    let engine = engine(horse_model(&[verdict(true, &[])]), search, horse_fetcher());

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let response = engine.search(SessionRequest::new("马踏飞燕"), token).await.unwrap();

    assert!(!response.success);
    assert!(response.report.is_none());
    assert_eq!(
        response.failure.unwrap().reason,
        FailureReason::Cancelled(CancelReason::User)
    );
    assert!(response.elapsed < Duration::from_millis(450));
}

#[tokio::test]
async fn test_time_budget_ends_with_completed_rounds() {
    let reflections: Vec<String> = (0..10).map(|i| verdict(false, &[&format!("aspect{}", i)])).collect();
    let search = horse_search().with_latency(Duration::from_millis(400));
    let engine = engine(horse_model(&reflections), search, horse_fetcher());

    let config = SessionConfig {
        max_execution_time_secs: 1,
        timeout_secs: 2,
        ..test_config(10)
    };
    let response = engine
        .search(SessionRequest::new("马踏飞燕").with_config(config), CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    assert!(!response.rounds.is_empty());
    assert!(response.rounds.len() < 10);
    assert!(response.elapsed < Duration::from_secs(3));
}

#[tokio::test]
async fn test_time_budget_before_first_round() {
    let model = horse_model(&[verdict(true, &[])]).with_latency(Duration::from_millis(1500));
    let engine = engine(model, horse_search(), horse_fetcher());

    let config = SessionConfig {
        max_execution_time_secs: 1,
        timeout_secs: 5,
        ..test_config(3)
    };
    let response = engine
        .search(SessionRequest::new("马踏飞燕").with_config(config), CancellationToken::new())
        .await
        .unwrap();

    assert!(!response.success);
    assert_eq!(
        response.failure.unwrap().reason,
        FailureReason::Cancelled(CancelReason::TimeBudget)
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let engine = engine(horse_model(&[]), horse_search(), horse_fetcher());
    let config = SessionConfig {
        verification_rounds: 0,
        ..Default::default()
    };

    let err = engine
        .search(SessionRequest::new("马踏飞燕").with_config(config), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "verification_rounds", .. }));
}

#[tokio::test]
async fn test_extraction_routed_to_its_own_model() {
    let main = horse_model(&[verdict(true, &[])]);
    let mut extractor = MockProvider::new("[]").with_name("extractor");
    extractor.add_response(MUSEUM_URL, facts("马踏飞燕", "东汉", &[("material", "青铜")]));

    let registry = CapabilityRegistry::new(Arc::new(main.clone()))
        .with(Capability::FactExtraction, Arc::new(extractor.clone()));
    let ports = Ports::new(
        registry,
        Arc::new(horse_search()),
        Arc::new(horse_fetcher()),
        Arc::new(DigestSynthesizer),
    );
    let engine = ResearchEngine::new(ports, PromptLibrary::builtin(), test_config(1));

    let response = engine
        .search(SessionRequest::new("马踏飞燕"), CancellationToken::new())
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(main.calls_matching(EXTRACTION), 0);
    assert_eq!(extractor.calls_matching(EXTRACTION), 2);
    assert_eq!(response.evidence.len(), 1);
}

#[tokio::test]
async fn test_comparison_adds_joint_step() {
    let mut model = MockProvider::new("[]");
    model.add_response(
        ANALYSIS,
        r#"{"complexity": "complex", "query_type": "comparison", "entities": ["司母戊鼎", "四羊方尊"]}"#,
    );
    model.add_response(RELATED, "[]");
    model.add_response(REFLECTION, verdict(true, &[]));

    let engine = engine(model, horse_search(), horse_fetcher());
    let response = engine
        .search(SessionRequest::new("司母戊鼎和四羊方尊有什么区别？"), CancellationToken::new())
        .await
        .unwrap();

    let plan = &response.strategy[0];
    assert_eq!(plan.steps.len(), 3);
    assert!(plan
        .steps
        .iter()
        .any(|s| s.keywords.contains("司母戊鼎") && s.keywords.contains("四羊方尊")));
}

#[test]
fn test_identical_runs_score_identically() {
    let run = || {
        let mut model = horse_model(&[verdict(true, &[])]);
        model.add_response(MUSEUM_URL, facts("马踏飞燕", "东汉", &[("材质", "青铜")]));
        model.add_response(WIKI_URL, facts("铜奔马", "Eastern Han", &[("excavation_date", "1969")]));
        let engine = engine(model, horse_search(), horse_fetcher());
        tokio_test::block_on(engine.search(SessionRequest::new("马踏飞燕"), CancellationToken::new())).unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.evidence, second.evidence);
    assert_eq!(first.evidence_summary, second.evidence_summary);
    assert_ne!(first.session_id, second.session_id);
}
