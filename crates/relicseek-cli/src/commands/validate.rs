//! Validate command implementation.

use crate::config::{AppConfig, ENV_API_KEY};
use crate::error::Result;
use crate::output::{render_table, Formatter};
use relicseek_engine::PromptName;
use relicseek_llm::openai::DEFAULT_BASE_URL;
use relicseek_search::SearxngClient;
use std::fmt;

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CheckStatus {
    /// Works
    Ok,
    /// Works with a caveat
    Warning,
    /// Will not work
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckStatus::Ok => f.write_str("ok"),
            CheckStatus::Warning => f.write_str("warning"),
            CheckStatus::Error => f.write_str("error"),
        }
    }
}

/// One line of the validation report.
#[derive(Debug, Clone, PartialEq)]
pub struct Check {
    /// What was checked
    pub name: &'static str,
    /// Result
    pub status: CheckStatus,
    /// Human-readable detail
    pub detail: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

/// All checks of one validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    /// Individual results
    pub checks: Vec<Check>,
}

impl ValidationReport {
    /// Worst status across all checks.
    pub fn overall(&self) -> CheckStatus {
        self.checks.iter().map(|c| c.status).max().unwrap_or(CheckStatus::Ok)
    }
}

/// Execute the validate command.
pub async fn execute_validate(config: &AppConfig, formatter: &Formatter) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    report.checks.extend(static_checks(config));
    report.checks.push(check_searxng(config).await);

    let rows = report.checks.iter().map(|c| vec![c.name.to_string(), c.status.to_string(), c.detail.clone()]);
    println!("{}", render_table(&["Check", "Status", "Detail"], rows));

    let message = format!("Setup status: {}", report.overall());
    let line = match report.overall() {
        CheckStatus::Ok => formatter.success(&message),
        CheckStatus::Warning => formatter.warning(&message),
        CheckStatus::Error => formatter.error(&message),
    };
    println!("{}", line);

    Ok(report)
}

/// Checks that need no network access.
pub fn static_checks(config: &AppConfig) -> Vec<Check> {
    vec![
        check_api_key(config),
        check_base_url(config),
        check_prompts(config),
        check_session(config),
    ]
}

fn check_api_key(config: &AppConfig) -> Check {
    let official = config.model.base_url.trim_end_matches('/') == DEFAULT_BASE_URL;
    match (config.model.api_key.trim().is_empty(), official) {
        (false, _) => Check::new("api_key", CheckStatus::Ok, "configured"),
        (true, true) => Check::new(
            "api_key",
            CheckStatus::Error,
            format!("missing; set [model] api_key or {}", ENV_API_KEY),
        ),
        (true, false) => Check::new(
            "api_key",
            CheckStatus::Warning,
            "empty; a placeholder key is sent to the self-hosted endpoint",
        ),
    }
}

fn check_base_url(config: &AppConfig) -> Check {
    match url::Url::parse(&config.model.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            Check::new("model_endpoint", CheckStatus::Ok, config.model.base_url.clone())
        }
        Ok(url) => Check::new(
            "model_endpoint",
            CheckStatus::Error,
            format!("unsupported scheme '{}'", url.scheme()),
        ),
        Err(e) => Check::new("model_endpoint", CheckStatus::Error, format!("invalid url: {}", e)),
    }
}

fn check_prompts(config: &AppConfig) -> Check {
    let Some(dir) = &config.prompts_dir else {
        return Check::new("prompts", CheckStatus::Ok, "built-in templates");
    };
    if !dir.is_dir() {
        return Check::new(
            "prompts",
            CheckStatus::Warning,
            format!("{} not found, using built-in templates", dir.display()),
        );
    }

    let missing: Vec<&str> = PromptName::ALL
        .iter()
        .map(|name| name.as_str())
        .filter(|name| !dir.join(format!("{}.txt", name)).is_file())
        .collect();
    if missing.is_empty() {
        Check::new("prompts", CheckStatus::Ok, format!("all templates in {}", dir.display()))
    } else {
        Check::new(
            "prompts",
            CheckStatus::Warning,
            format!("built-in fallback for: {}", missing.join(", ")),
        )
    }
}

fn check_session(config: &AppConfig) -> Check {
    match config.session.validate() {
        Ok(()) => Check::new(
            "session",
            CheckStatus::Ok,
            format!(
                "{} round(s), {}s budget",
                config.session.round_limit(),
                config.session.max_execution_time_secs
            ),
        ),
        Err(e) => Check::new("session", CheckStatus::Error, e.to_string()),
    }
}

async fn check_searxng(config: &AppConfig) -> Check {
    let client = match SearxngClient::new(config.searxng.clone()) {
        Ok(client) => client,
        Err(e) => return Check::new("searxng", CheckStatus::Error, e.to_string()),
    };
    match client.health_check().await {
        Ok(()) => Check::new("searxng", CheckStatus::Ok, format!("reachable at {}", config.searxng.base_url)),
        Err(e) => Check::new("searxng", CheckStatus::Error, e.to_string()),
    }
}
