//! Parse model output into analyses, terms, facts and verdicts
//!
//! Models are asked for JSON, but they sometimes wrap it in code fences,
//! surround it with prose, or answer in labeled lines instead. Each parser
//! accepts those shapes and only fails when nothing usable is present.

use relicseek_domain::{Complexity, QueryAnalysis, QueryType, ReflectionVerdict};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// One artifact as extracted from one page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FactRecord {
    /// Artifact name
    pub name: String,
    /// Dynasty, period or date (may be empty)
    pub era: String,
    /// Field name to value; includes `era` when known
    pub facts: BTreeMap<String, String>,
}

/// Common field names mapped to their canonical key
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("材质", "material"),
    ("材料", "material"),
    ("质地", "material"),
    ("年代", "date"),
    ("时代", "date"),
    ("朝代", "dynasty"),
    ("尺寸", "dimensions"),
    ("尺寸规格", "dimensions"),
    ("size", "dimensions"),
    ("出土地点", "excavation_site"),
    ("出土地", "excavation_site"),
    ("出土时间", "excavation_date"),
    ("收藏地", "collection"),
    ("收藏", "collection"),
    ("馆藏", "collection"),
    ("现藏", "collection"),
    ("工艺", "craft"),
    ("用途", "function"),
    ("意义", "significance"),
    ("价值", "significance"),
];

/// Pull the JSON payload out of a model response
///
/// Strips markdown code fences and any prose before the first `{` or `[` and
/// after the matching last `}` or `]`.
pub fn extract_json(response: &str) -> Option<String> {
    let mut trimmed = response.trim();

    if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        if lines.len() < 2 {
            return None;
        }
        let end = if lines[lines.len() - 1].trim_start().starts_with("```") {
            lines.len() - 1
        } else {
            lines.len()
        };
        let inner = lines[1..end].join("\n");
        return extract_json(&inner);
    }

    let start = trimmed.find(['{', '['])?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    if end < start {
        return None;
    }
    trimmed = &trimmed[start..=end];
    Some(trimmed.to_string())
}

fn parse_value(response: &str) -> Option<Value> {
    let json = extract_json(response)?;
    serde_json::from_str(&json).ok()
}

/// Parse a query analysis
pub fn parse_analysis(response: &str) -> Result<QueryAnalysis, String> {
    if let Some(Value::Object(obj)) = parse_value(response) {
        return Ok(analysis_from_json(&obj));
    }

    let complexity = labeled_value(response, &["复杂度", "complexity"]);
    let query_type = labeled_value(response, &["查询类型", "query type", "query_type"]);
    let entities = labeled_value(response, &["关键实体", "entities"]);
    let summary = labeled_value(response, &["查询意图", "summary"]);

    if complexity.is_none() && query_type.is_none() && entities.is_none() {
        return Err("response contains neither JSON nor labeled analysis".to_string());
    }

    Ok(QueryAnalysis {
        complexity: complexity.and_then(|c| Complexity::parse(&c)).unwrap_or_default(),
        query_type: query_type.and_then(|t| QueryType::parse(&t)).unwrap_or_default(),
        entities: entities.map(|e| split_list(&e)).unwrap_or_default(),
        summary: summary.unwrap_or_default(),
    })
}

fn analysis_from_json(obj: &Map<String, Value>) -> QueryAnalysis {
    QueryAnalysis {
        complexity: obj
            .get("complexity")
            .and_then(Value::as_str)
            .and_then(Complexity::parse)
            .unwrap_or_default(),
        query_type: obj
            .get("query_type")
            .or_else(|| obj.get("type"))
            .and_then(Value::as_str)
            .and_then(QueryType::parse)
            .unwrap_or_default(),
        entities: obj
            .get("entities")
            .or_else(|| obj.get("key_entities"))
            .map(string_list)
            .unwrap_or_default(),
        summary: obj
            .get("summary")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Parse a list of related search terms
///
/// Accepts a JSON array, an object with a `terms` array, or one term per
/// line (bullets and numbering are stripped). Never fails; garbage yields
/// an empty list.
pub fn parse_terms(response: &str) -> Vec<String> {
    let terms = match parse_value(response) {
        Some(Value::Array(items)) => string_list(&Value::Array(items)),
        Some(Value::Object(obj)) => obj.get("terms").map(string_list).unwrap_or_default(),
        _ => response
            .lines()
            .map(strip_bullet)
            .flat_map(split_list)
            .collect(),
    };

    let mut seen = Vec::new();
    for term in terms {
        if !term.is_empty() && !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}

/// Parse extracted facts
///
/// Accepts one object, an array of objects, or an object with an
/// `artifacts` array. Items without a name are skipped with a warning.
pub fn parse_facts(response: &str) -> Result<Vec<FactRecord>, String> {
    let value = parse_value(response).ok_or_else(|| "response contains no JSON".to_string())?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("artifacts") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                obj.insert("artifacts".to_string(), other);
                vec![Value::Object(obj)]
            }
            None => vec![Value::Object(obj)],
        },
        _ => return Err("expected a JSON object or array".to_string()),
    };

    let mut records = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match fact_record_from_json(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping extracted item {}: {}", idx, e),
        }
    }
    Ok(records)
}

fn fact_record_from_json(json: &Value) -> Result<FactRecord, String> {
    let obj = json.as_object().ok_or_else(|| "item is not a JSON object".to_string())?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| "missing or empty 'name'".to_string())?
        .to_string();

    let era = obj
        .get("era")
        .or_else(|| obj.get("dynasty"))
        .and_then(scalar_text)
        .unwrap_or_default();

    let mut facts = BTreeMap::new();
    if let Some(Value::Object(fields)) = obj.get("facts") {
        for (key, value) in fields {
            let Some(text) = scalar_text(value) else {
                continue;
            };
            let key = canonical_field(key);
            if !key.is_empty() && !text.is_empty() {
                facts.insert(key, text);
            }
        }
    }
    if !era.is_empty() {
        facts.entry("era".to_string()).or_insert_with(|| era.clone());
    }

    Ok(FactRecord { name, era, facts })
}

/// Lowercase, underscore-joined field key with common aliases resolved
pub fn canonical_field(key: &str) -> String {
    let key = key.trim().to_lowercase();
    let key = key.split_whitespace().collect::<Vec<_>>().join("_");
    FIELD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(key)
}

/// Parse a sufficiency verdict
pub fn parse_verdict(response: &str) -> Result<ReflectionVerdict, String> {
    if let Some(Value::Object(obj)) = parse_value(response) {
        let sufficient = obj
            .get("sufficient")
            .and_then(flag)
            .ok_or_else(|| "missing 'sufficient'".to_string())?;
        let missing = obj
            .get("missing_aspects")
            .or_else(|| obj.get("missing"))
            .map(string_list)
            .unwrap_or_default();
        let confidence = obj.get("confidence").and_then(confidence_value).unwrap_or(0.5);
        let rationale = obj
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Ok(ReflectionVerdict::new(sufficient, missing, confidence).with_rationale(rationale.trim()));
    }

    let sufficient = labeled_value(response, &["是否充分", "充分", "sufficient"])
        .and_then(|v| flag(&Value::String(v)))
        .ok_or_else(|| "response contains neither JSON nor a sufficiency label".to_string())?;

    let confidence = labeled_value(response, &["置信度", "confidence"])
        .and_then(|v| confidence_value(&Value::String(v)))
        .or_else(|| {
            labeled_value(response, &["综合评分", "score"]).and_then(|v| {
                let number = v.split('/').next()?.trim().parse::<f64>().ok()?;
                Some(number / 5.0)
            })
        })
        .unwrap_or(0.5);

    let missing = bullet_block(response, &["改进建议", "缺失方面", "missing aspects", "missing"]);
    let rationale = labeled_value(response, &["理由", "rationale"]).unwrap_or_default();

    Ok(ReflectionVerdict::new(sufficient, missing, confidence).with_rationale(rationale))
}

/// Value after `label:` / `label：` on the first line carrying any of the labels
fn labeled_value(response: &str, labels: &[&str]) -> Option<String> {
    for line in response.lines() {
        let line = strip_bullet(line);
        for label in labels {
            let Some(rest) = strip_label(line, label) else {
                continue;
            };
            let value = rest.trim().trim_matches(['*', '"']).trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let line = line.trim().trim_start_matches('*').trim_start();
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    let rest = line[label.len()..].trim_start_matches('*').trim_start();
    rest.strip_prefix('：').or_else(|| rest.strip_prefix(':'))
}

/// Bulleted lines following a label line, up to the next blank or unbulleted line
fn bullet_block(response: &str, labels: &[&str]) -> Vec<String> {
    let mut lines = response.lines();
    let mut items = Vec::new();

    for line in lines.by_ref() {
        if let Some(rest) = labels.iter().find_map(|label| strip_label(line, label)) {
            items.extend(split_list(rest));
            break;
        }
    }
    for line in lines {
        let trimmed = line.trim();
        if !is_bullet(trimmed) {
            break;
        }
        let item = strip_bullet(trimmed).trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }
    }
    items
}

fn is_bullet(line: &str) -> bool {
    line.starts_with('-')
        || line.starts_with('•')
        || line.starts_with('*')
        || line
            .split_once(['.', '、', ')'])
            .is_some_and(|(n, _)| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix(['-', '•']) {
        return rest.trim_start();
    }
    if let Some((number, rest)) = trimmed.split_once(['.', '、', ')']) {
        if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
            return rest.trim_start();
        }
    }
    trimmed
}

fn split_list(text: &str) -> Vec<String> {
    text.split([',', '，', '、', ';', '；'])
        .map(|s| s.trim().trim_matches('"').trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => split_list(s),
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).filter(|s| !s.is_empty()).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            if ["true", "yes", "y", "sufficient", "是", "充分"].contains(&s.as_str()) {
                Some(true)
            } else if ["false", "no", "n", "insufficient", "否", "不充分"].contains(&s.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn confidence_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match s.to_lowercase().as_str() {
                "high" | "高" => Some(0.8),
                "medium" | "中" => Some(0.5),
                "low" | "低" => Some(0.2),
                other => other.trim_end_matches('%').parse::<f64>().ok().map(|n| if n > 1.0 { n / 100.0 } else { n }),
            }
        }
        _ => None,
    }
}
