//! Status command implementation.

use crate::config::{mask_secret, AppConfig};
use crate::error::Result;
use crate::output::{render_table, Formatter};
use relicseek_engine::{PromptName, PromptSource, ResearchEngine};

/// Execute the status command.
pub fn execute_status(config: &AppConfig, engine: &ResearchEngine, formatter: &Formatter) -> Result<()> {
    println!("{}", status_text(config, engine));
    println!("{}", formatter.info("Run 'relicseek validate' to test connectivity"));
    Ok(())
}

/// Configuration summary and capability wiring.
pub fn status_text(config: &AppConfig, engine: &ResearchEngine) -> String {
    let session = engine.defaults();
    let settings = render_table(
        &["Setting", "Value"],
        [
            ["Model endpoint".to_string(), config.model.base_url.clone()],
            ["API key".to_string(), display_key(&config.model.api_key)],
            ["SearXNG".to_string(), config.searxng.base_url.clone()],
            ["Rounds".to_string(), session.round_limit().to_string()],
            ["Time budget".to_string(), format!("{}s", session.max_execution_time_secs)],
            ["Call timeout".to_string(), format!("{}s", session.timeout_secs)],
            ["Quality threshold".to_string(), format!("{:.2}", session.quality_threshold)],
            ["Results per query".to_string(), session.max_results_per_query.to_string()],
            ["Concurrent fetches".to_string(), session.max_concurrent_fetches.to_string()],
        ],
    );

    let wiring = render_table(
        &["Capability", "Model"],
        engine
            .ports()
            .models
            .describe()
            .into_iter()
            .map(|(capability, model)| [capability.as_str().to_string(), model]),
    );

    let prompts = render_table(
        &["Prompt", "Source"],
        PromptName::ALL.iter().map(|name| {
            let source = match engine.prompts().source(*name) {
                PromptSource::Builtin => "built-in".to_string(),
                PromptSource::File(path) => path.display().to_string(),
            };
            [name.as_str().to_string(), source]
        }),
    );

    [settings, wiring, prompts].join("\n")
}

fn display_key(key: &str) -> String {
    if key.is_empty() {
        "(not set)".to_string()
    } else {
        mask_secret(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_engine;

    #[test]
    fn test_status_text() {
        let mut config = AppConfig::default();
        config.model.api_key = "sk-abcdefghijkl".to_string();
        config.session.verification_rounds = 2;
        let engine = build_engine(&config).unwrap();

        let text = status_text(&config, &engine);
        assert!(text.contains("sk-...ijkl"));
        assert!(!text.contains("sk-abcdefghijkl"));
        assert!(text.contains("fact_extraction"));
        assert!(text.contains("report_synthesis"));
        assert!(text.contains("built-in"));
    }

    #[test]
    fn test_display_key() {
        assert_eq!(display_key(""), "(not set)");
        assert_eq!(display_key("sk-abcdefghijkl"), "sk-...ijkl");
    }
}
