//! Wiring configured backends into a research engine.

use crate::config::AppConfig;
use crate::error::Result;
use relicseek_domain::traits::LanguageModel;
use relicseek_engine::{Capability, CapabilityRegistry, Ports, PromptLibrary, ResearchEngine};
use relicseek_llm::OpenAiProvider;
use relicseek_search::{SearxngClient, WebFetcher};
use relicseek_synthesizer::LlmReportSynthesizer;
use std::sync::Arc;
use tracing::debug;

/// Prompt templates: built-ins overlaid with `prompts_dir`, if configured.
pub fn load_prompts(config: &AppConfig) -> Result<PromptLibrary> {
    match &config.prompts_dir {
        Some(dir) => Ok(PromptLibrary::from_dir(dir)?),
        None => Ok(PromptLibrary::builtin()),
    }
}

/// Build the engine from configuration.
///
/// One model serves every capability, report synthesis included.
pub fn build_engine(config: &AppConfig) -> Result<ResearchEngine> {
    let model: Arc<dyn LanguageModel> = Arc::new(OpenAiProvider::new(config.model.clone())?);
    let search = Arc::new(SearxngClient::new(config.searxng.clone())?);
    let fetch = Arc::new(WebFetcher::new(config.fetch.clone())?);
    let prompts = load_prompts(config)?;

    let registry = CapabilityRegistry::new(model);
    let synthesizer = Arc::new(LlmReportSynthesizer::new(
        registry.resolve(Capability::ReportSynthesis),
        Arc::new(prompts.clone()),
    ));
    let ports = Ports::new(registry, search, fetch, synthesizer);

    debug!(
        "Engine ready: model {} at {}, SearXNG at {}",
        config.model.model, config.model.base_url, config.searxng.base_url
    );
    Ok(ResearchEngine::new(ports, prompts, config.session.clone()))
}
