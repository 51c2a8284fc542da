//! Prompt templates for the research loop
//!
//! Every model call renders one named Handlebars template. Templates are
//! registered in strict mode, so a `{{variable}}` the caller did not supply
//! is an error, and nothing is HTML-escaped. A directory of `<name>.txt`
//! files can override any built-in template.

use crate::error::PromptError;
use handlebars::{Handlebars, RenderError, RenderErrorReason};
use relicseek_domain::{EvidenceSet, QueryAnalysis, ReflectionVerdict};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The templates the engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PromptName {
    /// System prompt sent as context with every call
    SearchExpert,
    /// Query complexity, type and entities
    QueryAnalysis,
    /// Synonyms and related terms for one facet
    RelatedTerms,
    /// Structured facts from one fetched page
    FactExtraction,
    /// Sufficiency assessment after a round
    Reflection,
    /// Final report text
    FinalSummary,
}

impl PromptName {
    /// All templates, in load order
    pub const ALL: [PromptName; 6] = [
        PromptName::SearchExpert,
        PromptName::QueryAnalysis,
        PromptName::RelatedTerms,
        PromptName::FactExtraction,
        PromptName::Reflection,
        PromptName::FinalSummary,
    ];

    /// Template name, also the override file stem
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptName::SearchExpert => "search_expert",
            PromptName::QueryAnalysis => "query_analysis",
            PromptName::RelatedTerms => "related_terms",
            PromptName::FactExtraction => "fact_extraction",
            PromptName::Reflection => "reflection",
            PromptName::FinalSummary => "final_summary",
        }
    }

    /// Variables a caller must supply when rendering
    pub fn required_variables(&self) -> &'static [&'static str] {
        match self {
            PromptName::SearchExpert => &[],
            PromptName::QueryAnalysis => &["query"],
            PromptName::RelatedTerms => &["query", "facet", "max_terms"],
            PromptName::FactExtraction => &["query", "url", "title", "text"],
            PromptName::Reflection => &[
                "query",
                "round",
                "round_limit",
                "quality_score",
                "quality_threshold",
                "evidence",
                "conflicts",
                "history",
            ],
            PromptName::FinalSummary => &["query", "analysis", "evidence", "conflicts"],
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            PromptName::SearchExpert => SEARCH_EXPERT,
            PromptName::QueryAnalysis => QUERY_ANALYSIS,
            PromptName::RelatedTerms => RELATED_TERMS,
            PromptName::FactExtraction => FACT_EXTRACTION,
            PromptName::Reflection => REFLECTION,
            PromptName::FinalSummary => FINAL_SUMMARY,
        }
    }
}

impl fmt::Display for PromptName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a loaded template came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// Compiled into the binary
    Builtin,
    /// Read from an override file
    File(PathBuf),
}

/// Loaded set of templates
#[derive(Clone)]
pub struct PromptLibrary {
    registry: Handlebars<'static>,
    texts: BTreeMap<PromptName, (String, PromptSource)>,
}

impl PromptLibrary {
    fn empty() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        Self {
            registry,
            texts: BTreeMap::new(),
        }
    }

    /// Library with only the built-in templates
    pub fn builtin() -> Self {
        let mut library = Self::empty();
        for name in PromptName::ALL {
            if let Err(e) = library.register(name, name.builtin().to_string(), PromptSource::Builtin) {
                warn!("Built-in prompt unusable: {}", e);
            }
        }
        library
    }

    /// Built-in templates, overridden by any `<name>.txt` found in `dir`
    ///
    /// A missing directory is not an error; an unreadable or malformed file is.
    pub fn from_dir(dir: &Path) -> Result<Self, PromptError> {
        let mut library = Self::builtin();
        if !dir.is_dir() {
            debug!("Prompt directory {} not found, using built-in templates", dir.display());
            return Ok(library);
        }

        for name in PromptName::ALL {
            let path = dir.join(format!("{}.txt", name.as_str()));
            if !path.is_file() {
                continue;
            }
            let text = std::fs::read_to_string(&path).map_err(|source| PromptError::Io {
                name: name.as_str(),
                source,
            })?;
            library.register(name, text, PromptSource::File(path.clone()))?;
            debug!("Loaded prompt override {}", path.display());
        }
        Ok(library)
    }

    fn register(&mut self, name: PromptName, text: String, source: PromptSource) -> Result<(), PromptError> {
        self.registry
            .register_template_string(name.as_str(), &text)
            .map_err(|e| PromptError::Template {
                name: name.as_str(),
                message: e.to_string(),
            })?;
        self.texts.insert(name, (text, source));
        Ok(())
    }

    /// Raw template text
    pub fn template(&self, name: PromptName) -> &str {
        self.texts
            .get(&name)
            .map(|(text, _)| text.as_str())
            .unwrap_or_else(|| name.builtin())
    }

    /// Where a template was loaded from
    pub fn source(&self, name: PromptName) -> PromptSource {
        self.texts
            .get(&name)
            .map(|(_, source)| source.clone())
            .unwrap_or(PromptSource::Builtin)
    }

    /// The system prompt
    pub fn system(&self) -> &str {
        self.template(PromptName::SearchExpert)
    }

    /// Render a template with string variables
    pub fn render(&self, name: PromptName, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let data: Map<String, Value> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        self.registry
            .render(name.as_str(), &data)
            .map_err(|e| render_error(name, e))
    }
}

fn render_error(name: PromptName, error: RenderError) -> PromptError {
    match error.reason() {
        RenderErrorReason::MissingVariable(Some(variable)) => PromptError::MissingVariables {
            name: name.as_str(),
            missing: vec![variable.clone()],
        },
        _ => PromptError::Template {
            name: name.as_str(),
            message: error.to_string(),
        },
    }
}

impl fmt::Debug for PromptLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.texts.iter().map(|(name, (_, source))| (name, source)))
            .finish()
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Evidence as prompt lines, most credible first
pub fn evidence_lines(set: &EvidenceSet, limit: usize) -> String {
    if set.is_empty() {
        return "(none yet)".to_string();
    }
    let mut lines = Vec::new();
    for evidence in set.ranked().into_iter().take(limit) {
        let fields: Vec<String> = evidence
            .fact_fields
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        lines.push(format!(
            "- {} (credibility {:.2}, {} source(s)): {}",
            evidence.name,
            evidence.credibility,
            evidence.source_urls.len(),
            fields.join("; ")
        ));
    }
    if set.len() > limit {
        lines.push(format!("- ... and {} more", set.len() - limit));
    }
    lines.join("\n")
}

/// Open conflicts as prompt lines
pub fn conflict_lines(set: &EvidenceSet) -> String {
    let lines: Vec<String> = set
        .conflicts()
        .map(|conflict| {
            let name = set
                .get(conflict.evidence_id)
                .map(|e| e.name.as_str())
                .unwrap_or("?");
            format!("- {}: {} = {}", name, conflict.field, conflict.values().join(" | "))
        })
        .collect();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

/// Earlier verdicts as prompt lines; `last_round` is the round of the newest one
pub fn history_lines<'a, I>(verdicts: I, last_round: u32) -> String
where
    I: IntoIterator<Item = &'a ReflectionVerdict>,
    I::IntoIter: DoubleEndedIterator,
{
    let mut lines: Vec<String> = verdicts
        .into_iter()
        .rev()
        .zip((1..=last_round).rev())
        .map(|(verdict, round)| {
            let missing = if verdict.missing_aspects.is_empty() {
                "nothing listed".to_string()
            } else {
                verdict.missing_aspects.join(", ")
            };
            format!(
                "- round {}: sufficient={}, confidence {:.2}, missing: {}",
                round, verdict.sufficient, verdict.confidence, missing
            )
        })
        .collect();
    if lines.is_empty() {
        return "(first assessment)".to_string();
    }
    lines.reverse();
    lines.join("\n")
}

/// Query analysis on one line
pub fn analysis_line(analysis: &QueryAnalysis) -> String {
    let mut line = format!(
        "{} {} query; entities: {}",
        analysis.complexity,
        analysis.query_type,
        if analysis.entities.is_empty() {
            "none".to_string()
        } else {
            analysis.entities.join(", ")
        }
    );
    if !analysis.summary.is_empty() {
        line.push_str("; intent: ");
        line.push_str(&analysis.summary);
    }
    line
}

const SEARCH_EXPERT: &str = r#"You are RelicSeek, a research assistant specialised in cultural relics and historical artifacts.
You answer in the language of the question. You only state facts supported by the material you are given,
you keep dates, dynasties, materials and collection places precise, and you say so when sources disagree."#;

const QUERY_ANALYSIS: &str = r#"Analyze the following cultural relic research query.

Query: {{query}}

Determine:
- complexity: "simple" (one artifact, one attribute), "moderate" or "complex" (several artifacts, comparison, open topic)
- query_type: "entity" (a named artifact), "topic" (a period, technique, site or theme) or "comparison" (two or more artifacts)
- entities: the artifacts, sites or topics to search for, most important first, in the query's own language
- summary: one sentence restating what the user wants to know

Output format (JSON object only, no additional text):
{"complexity": "moderate", "query_type": "entity", "entities": ["..."], "summary": "..."}"#;

const RELATED_TERMS: &str = r#"Suggest related search terms for a cultural relic facet.

Research query: {{query}}
Facet: {{facet}}

List at most {{max_terms}} alternative names, translations or closely related terms that would help
a web search find authoritative pages about this facet (museum catalogues, excavation reports,
encyclopedias). Do not repeat the facet itself.

Output format (JSON array of strings only, no additional text):
["term one", "term two"]"#;

const FACT_EXTRACTION: &str = r#"Extract structured facts about cultural relics from the page below.

Research query: {{query}}
Source: {{url}}
Title: {{title}}

Page text:
---
{{text}}
---

For every artifact the page describes that is relevant to the query, report:
- name: the artifact's name as the page gives it
- era: dynasty, period or date of the artifact ("" if the page does not say)
- facts: an object of short field values, using keys such as material, dimensions, excavation_site,
  excavation_date, collection, craft, function, significance

Only report what the page states. Leave out fields the page does not mention.

Output format (JSON array only, empty array if nothing relevant, no additional text):
[{"name": "...", "era": "...", "facts": {"material": "..."}}]"#;

const REFLECTION: &str = r#"Assess whether the evidence gathered so far answers the research query.

Research query: {{query}}
Round: {{round}} of {{round_limit}}
Aggregate credibility: {{quality_score}} (required: {{quality_threshold}})

Evidence:
{{evidence}}

Disputed fields:
{{conflicts}}

Earlier assessments:
{{history}}

Decide whether the evidence is sufficient to answer the query. If it is not, list the specific
aspects that are still missing or disputed, most important first, each as a short search phrase.

Output format (JSON object only, no additional text):
{"sufficient": false, "missing_aspects": ["..."], "confidence": 0.0-1.0, "rationale": "..."}"#;

const FINAL_SUMMARY: &str = r#"Write the final research report for the query below.

Research query: {{query}}
Query analysis: {{analysis}}

Evidence (most credible first):
{{evidence}}

Disputed fields:
{{conflicts}}

Write a clear, well-organised answer in the language of the query. State where each key fact
comes from, point out disputed facts and the competing values instead of picking one silently,
and end with a short note on overall reliability. Plain text only."#;

#[cfg(test)]
mod tests {
    use super::*;

    fn full_vars(name: PromptName) -> Vec<(&'static str, &'static str)> {
        name.required_variables().iter().map(|var| (*var, "x")).collect()
    }

    #[test]
    fn test_render_requires_variables() {
        let library = PromptLibrary::builtin();
        let err = library.render(PromptName::FactExtraction, &[("query", "q")]).unwrap_err();
        match err {
            PromptError::MissingVariables { name, missing } => {
                assert_eq!(name, "fact_extraction");
                assert_eq!(missing.len(), 1);
                assert!(missing[0].contains("url"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_render_analysis() {
        let library = PromptLibrary::builtin();
        let prompt = library.render(PromptName::QueryAnalysis, &[("query", "马踏飞燕的材质")]).unwrap();
        assert!(prompt.starts_with("Analyze the following cultural relic research query."));
        assert!(prompt.contains("马踏飞燕的材质"));
        assert!(!prompt.contains("{{query}}"));
    }

    #[test]
    fn test_values_are_not_escaped_or_expanded() {
        let library = PromptLibrary::builtin();
        let prompt = library
            .render(
                PromptName::FactExtraction,
                &[("query", "q"), ("url", "https://a.example/?x=1&y=2"), ("title", "<b>鼎</b>"), ("text", "{{query}}")],
            )
            .unwrap();
        assert!(prompt.contains("https://a.example/?x=1&y=2"));
        assert!(prompt.contains("<b>鼎</b>"));
        assert!(prompt.contains("{{query}}"));
    }

    #[test]
    fn test_builtin_templates_render_with_their_variables() {
        let library = PromptLibrary::builtin();
        for name in PromptName::ALL {
            let prompt = library.render(name, &full_vars(name));
            assert!(prompt.is_ok(), "{} failed: {:?}", name, prompt.err());
            for var in name.required_variables() {
                assert!(
                    library.template(name).contains(&format!("{{{{{}}}}}", var)),
                    "{} does not use {}",
                    name,
                    var
                );
            }
        }
    }

    #[test]
    fn test_history_lines_number_rounds() {
        let verdicts = vec![
            ReflectionVerdict::new(false, vec!["出土时间".into()], 0.3),
            ReflectionVerdict::new(false, vec![], 0.6),
        ];
        let text = history_lines(&verdicts, 3);
        assert_eq!(
            text,
            "- round 2: sufficient=false, confidence 0.30, missing: 出土时间\n- round 3: sufficient=false, confidence 0.60, missing: nothing listed"
        );
        assert_eq!(history_lines(&Vec::<ReflectionVerdict>::new(), 0), "(first assessment)");
    }

    #[test]
    fn test_empty_set_lines() {
        let set = EvidenceSet::new();
        assert_eq!(evidence_lines(&set, 10), "(none yet)");
        assert_eq!(conflict_lines(&set), "(none)");
    }

    #[test]
    fn test_directory_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reflection.txt"), "Judge {{query}} now").unwrap();

        let library = PromptLibrary::from_dir(dir.path()).unwrap();
        assert_eq!(library.template(PromptName::Reflection), "Judge {{query}} now");
        assert!(matches!(library.source(PromptName::Reflection), PromptSource::File(_)));
        assert_eq!(library.source(PromptName::QueryAnalysis), PromptSource::Builtin);
        assert_eq!(
            library.render(PromptName::Reflection, &[("query", "铜奔马")]).unwrap(),
            "Judge 铜奔马 now"
        );
    }

    #[test]
    fn test_malformed_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("final_summary.txt"), "Report {{#if query}} unclosed").unwrap();

        let err = PromptLibrary::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, PromptError::Template { name: "final_summary", .. }));
    }

    #[test]
    fn test_missing_directory_falls_back() {
        let library = PromptLibrary::from_dir(Path::new("/nonexistent/relicseek/prompts")).unwrap();
        assert_eq!(library.source(PromptName::FinalSummary), PromptSource::Builtin);
    }
}
