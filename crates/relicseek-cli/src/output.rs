//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use relicseek_domain::{Conflict, Evidence};
use relicseek_engine::{Confidence, SessionResponse};
use serde_json::{json, Value};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Longest fact list shown in a table cell
const FACTS_CELL_CHARS: usize = 80;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self { format, color_enabled }
    }

    /// The selected format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a finished research session.
    pub fn format_response(&self, response: &SessionResponse) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&response_json(response))?),
            OutputFormat::Table => Ok(self.format_response_table(response)),
            OutputFormat::Quiet => Ok(self.format_response_quiet(response)),
        }
    }

    fn format_response_table(&self, response: &SessionResponse) -> String {
        let mut out = Vec::new();

        if let Some(report) = &response.report {
            out.push(self.colorize(&report.title, "cyan"));
            out.push(String::new());
            out.push(report.body.clone());
            out.push(String::new());
        }

        if let Some(failure) = &response.failure {
            out.push(self.error(&format!(
                "Research failed after {} round(s): {}",
                failure.last_completed_round, failure.reason
            )));
        }

        out.push(evidence_table(&response.evidence));
        if !response.evidence_summary.open_conflicts.is_empty() {
            out.push(self.warning("Disputed facts:"));
            out.push(conflict_table(&response.evidence, &response.evidence_summary.open_conflicts));
        }

        let summary = &response.evidence_summary;
        out.push(format!(
            "{} | quality {:.2} ({}) | {} record(s) from {} source(s) | {} round(s) in {:.1}s",
            response.session_id,
            summary.quality_score,
            self.confidence_label(summary.confidence),
            summary.evidence_count,
            summary.source_count,
            response.rounds.len(),
            response.elapsed.as_secs_f64()
        ));

        out.join("\n")
    }

    fn format_response_quiet(&self, response: &SessionResponse) -> String {
        match (&response.report, &response.failure) {
            (Some(report), _) => report.body.clone(),
            (None, Some(failure)) => failure.reason.to_string(),
            (None, None) => String::new(),
        }
    }

    /// Per-round progress lines.
    pub fn format_rounds(&self, response: &SessionResponse) -> String {
        response
            .rounds
            .iter()
            .map(|round| self.info(&round.summary()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn confidence_label(&self, confidence: Confidence) -> String {
        let color = match confidence {
            Confidence::High => "green",
            Confidence::Medium => "yellow",
            Confidence::Low => "red",
        };
        self.colorize(confidence.as_str(), color)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Render rows as a rounded table with a centered header.
pub fn render_table<I, R>(header: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut builder = Builder::default();
    builder.push_record(header.iter().map(|h| h.to_string()));
    for row in rows {
        builder.push_record(row);
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

fn evidence_table(evidence: &[Evidence]) -> String {
    if evidence.is_empty() {
        return "No evidence found.".to_string();
    }

    render_table(
        &["ID", "Relic", "Credibility", "Sources", "Facts"],
        evidence.iter().map(|e| {
            let facts: Vec<String> = e.fact_fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            vec![
                e.id.short(),
                e.name.clone(),
                format!("{:.2}", e.credibility),
                e.source_urls.len().to_string(),
                clip(&facts.join("; "), FACTS_CELL_CHARS),
            ]
        }),
    )
}

fn conflict_table(evidence: &[Evidence], conflicts: &[Conflict]) -> String {
    render_table(
        &["Relic", "Field", "Candidates"],
        conflicts.iter().map(|c| {
            let name = evidence
                .iter()
                .find(|e| e.id == c.evidence_id)
                .map(|e| e.name.clone())
                .unwrap_or_else(|| c.evidence_id.short());
            let candidates: Vec<String> = c
                .candidates
                .iter()
                .map(|cand| format!("{} ({:.2}, {})", cand.value, cand.credibility, cand.source_url))
                .collect();
            vec![name, c.field.clone(), candidates.join("\n")]
        }),
    )
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{}…", kept)
}

/// Serializable representation of a session result.
pub fn response_json(response: &SessionResponse) -> Value {
    let summary = &response.evidence_summary;

    json!({
        "success": response.success,
        "session_id": response.session_id.to_string(),
        "query": response.query,
        "analysis": response.analysis.as_ref().map(|a| json!({
            "complexity": a.complexity.as_str(),
            "query_type": a.query_type.as_str(),
            "entities": a.entities,
            "summary": a.summary,
        })),
        "strategy": response.strategy.iter().map(|plan| json!({
            "round": plan.round,
            "steps": plan.steps.iter().map(|s| json!({
                "query": s.query_string(),
                "purpose": s.purpose,
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
        "evidence_summary": {
            "quality_score": summary.quality_score,
            "confidence": summary.confidence.as_str(),
            "evidence_count": summary.evidence_count,
            "source_count": summary.source_count,
            "open_conflicts": summary.open_conflicts.iter().map(conflict_json).collect::<Vec<_>>(),
        },
        "evidence": response.evidence.iter().map(|e| json!({
            "id": e.id.to_string(),
            "name": e.name,
            "key": e.key,
            "canonical_url": e.canonical_url,
            "source_urls": e.source_urls,
            "facts": e.fact_fields,
            "field_sources": e.field_sources,
            "credibility": e.credibility,
            "first_seen_round": e.first_seen_round,
        })).collect::<Vec<_>>(),
        "report": response.report.as_ref().map(|r| json!({
            "title": r.title,
            "body": r.body,
            "cited_urls": r.cited_urls,
            "generated_by": r.generated_by,
        })),
        "failure": response.failure.as_ref().map(|f| json!({
            "kind": f.reason.kind(),
            "message": f.reason.to_string(),
            "last_completed_round": f.last_completed_round,
            "partial_evidence_count": f.partial_evidence_summary.evidence_count,
        })),
        "rounds": response.rounds.iter().map(|r| json!({
            "round": r.round,
            "queries": r.queries,
            "failed_steps": r.failed_steps,
            "hits": r.hits,
            "fetched": r.fetched,
            "fetch_failures": r.fetch_failures,
            "extraction_failures": r.extraction_failures,
            "evidence_created": r.evidence_created,
            "evidence_merged": r.evidence_merged,
            "conflicts_opened": r.conflicts_opened,
            "quality_score": r.quality_score,
            "verdict": r.verdict.as_ref().map(|v| json!({
                "sufficient": v.sufficient,
                "missing_aspects": v.missing_aspects,
                "confidence": v.confidence,
                "rationale": v.rationale,
            })),
            "elapsed_ms": r.elapsed.as_millis() as u64,
        })).collect::<Vec<_>>(),
        "elapsed_ms": response.elapsed.as_millis() as u64,
    })
}

fn conflict_json(conflict: &Conflict) -> Value {
    json!({
        "evidence_id": conflict.evidence_id.to_string(),
        "field": conflict.field,
        "candidates": conflict.candidates.iter().map(|c| json!({
            "value": c.value,
            "source_url": c.source_url,
            "credibility": c.credibility,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relicseek_domain::{CandidateValue, EvidenceSet, Report};
    use relicseek_engine::{EvidenceSummary, FailureReason, RoundReport, SessionId};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn horse() -> Evidence {
        let mut facts = BTreeMap::new();
        facts.insert("material".to_string(), "青铜".to_string());
        facts.insert("excavation_date".to_string(), "1969".to_string());
        let mut e = Evidence::new(
            "马踏飞燕|东汉",
            "马踏飞燕",
            "https://www.gansumuseum.example/horse",
            facts,
            "",
            1,
        );
        e.credibility = 0.85;
        e
    }

    fn response(success: bool) -> SessionResponse {
        let evidence = horse();
        let mut set = EvidenceSet::new();
        set.insert(evidence.clone());
        let conflict = set.conflict_entry(evidence.id, "excavation_date");
        for (value, url) in [("1969", "https://www.gansumuseum.example/horse"), ("1983", "https://blog.example.com/a")] {
            conflict.add_candidate(CandidateValue {
                value: value.to_string(),
                evidence_id: evidence.id,
                source_url: url.to_string(),
                credibility: 0.5,
            });
        }
        let summary = EvidenceSummary::of(&set);

        SessionResponse {
            success,
            session_id: SessionId::new(),
            query: "马踏飞燕".to_string(),
            analysis: None,
            strategy: Vec::new(),
            evidence_summary: summary.clone(),
            evidence: vec![evidence],
            report: success.then(|| Report {
                title: "马踏飞燕".to_string(),
                body: "东汉青铜器".to_string(),
                cited_urls: vec!["https://www.gansumuseum.example/horse".to_string()],
                generated_by: "digest".to_string(),
            }),
            failure: (!success).then(|| relicseek_engine::SessionFailure {
                reason: FailureReason::Cancelled(relicseek_engine::CancelReason::User),
                last_completed_round: 1,
                partial_evidence_summary: summary,
            }),
            rounds: vec![RoundReport {
                round: 1,
                queries: vec!["文物 马踏飞燕".to_string()],
                hits: 2,
                ..Default::default()
            }],
            elapsed: Duration::from_millis(1500),
        }
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_response(&response(true)).unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["success"], true);
        assert_eq!(value["evidence"][0]["facts"]["material"], "青铜");
        assert_eq!(value["evidence_summary"]["open_conflicts"][0]["field"], "excavation_date");
        assert_eq!(value["report"]["generated_by"], "digest");
        assert!(value["failure"].is_null());
        assert_eq!(value["rounds"][0]["hits"], 2);
        assert_eq!(value["elapsed_ms"], 1500);
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_response(&response(true)).unwrap();
        assert!(output.contains("东汉青铜器"));
        assert!(output.contains("Credibility"));
        assert!(output.contains("Disputed facts"));
        assert!(output.contains("1983"));
        assert!(output.contains("1 round(s)"));
    }

    #[test]
    fn test_failure_formats() {
        let table = Formatter::new(OutputFormat::Table, false)
            .format_response(&response(false))
            .unwrap();
        assert!(table.contains("Research failed after 1 round(s)"));

        let quiet = Formatter::new(OutputFormat::Quiet, false)
            .format_response(&response(false))
            .unwrap();
        assert_eq!(quiet, "Cancelled: cancelled by caller");
    }

    #[test]
    fn test_quiet_format_is_report_body() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        assert_eq!(formatter.format_response(&response(true)).unwrap(), "东汉青铜器");
    }

    #[test]
    fn test_empty_evidence_table() {
        assert_eq!(evidence_table(&[]), "No evidence found.");
    }

    #[test]
    fn test_clip() {
        assert_eq!(clip("青铜", 5), "青铜");
        assert_eq!(clip("abcdef", 3), "abc…");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
        assert_eq!(formatter.warning("careful"), "⚠ careful");
    }
}
