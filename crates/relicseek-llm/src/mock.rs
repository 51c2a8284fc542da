//! Mock LLM provider for deterministic testing

use relicseek_domain::traits::LanguageModel;
use relicseek_domain::{ModelError, ModelErrorReason};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Reply {
    Fixed(String),
    Sequence(VecDeque<String>),
    Error(ModelErrorReason),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    reply: Reply,
}

/// Mock LLM provider for deterministic testing
///
/// Returns pre-configured responses without making any network calls. Rules
/// match when the prompt contains their pattern and are tried in the order
/// they were added; prompts matching no rule get the default response.
///
/// # Examples
///
/// ```
/// use relicseek_llm::MockProvider;
/// use relicseek_domain::traits::LanguageModel;
///
/// let mut provider = MockProvider::default();
/// provider.add_response("classify", r#"{"complexity":"simple"}"#);
/// provider.add_responses("reflect", ["first", "second"]);
///
/// assert_eq!(provider.complete("please classify this", "").unwrap(), r#"{"complexity":"simple"}"#);
/// assert_eq!(provider.complete("reflect now", "").unwrap(), "first");
/// assert_eq!(provider.complete("reflect now", "").unwrap(), "second");
/// assert_eq!(provider.complete("reflect now", "").unwrap(), "second");
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    name: String,
    default_response: String,
    rules: Arc<Mutex<Vec<Rule>>>,
    prompts: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            name: "mock".to_string(),
            default_response: response.into(),
            rules: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
            latency: None,
        }
    }

    /// Set the name reported by [`LanguageModel::name`]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sleep this long before every answer
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer prompts containing `pattern` with `response`
    pub fn add_response(&mut self, pattern: impl Into<String>, response: impl Into<String>) {
        self.push_rule(pattern, Reply::Fixed(response.into()));
    }

    /// Answer successive prompts containing `pattern` with successive responses
    ///
    /// The last response repeats once the sequence is exhausted.
    pub fn add_responses<I, S>(&mut self, pattern: impl Into<String>, responses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let responses: VecDeque<String> = responses.into_iter().map(Into::into).collect();
        self.push_rule(pattern, Reply::Sequence(responses));
    }

    /// Configure to return an error for prompts containing `pattern`
    pub fn add_error(&mut self, pattern: impl Into<String>, reason: ModelErrorReason) {
        self.push_rule(pattern, Reply::Error(reason));
    }

    fn push_rule(&mut self, pattern: impl Into<String>, reply: Reply) {
        lock(&self.rules).push(Rule {
            pattern: pattern.into(),
            reply,
        });
    }

    /// Get the number of times the provider was called
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Number of calls whose prompt contained `pattern`
    pub fn calls_matching(&self, pattern: &str) -> usize {
        lock(&self.prompts).iter().filter(|p| p.contains(pattern)).count()
    }

    /// Every prompt received so far
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Reset the call history
    pub fn reset_call_count(&self) {
        lock(&self.prompts).clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LanguageModel for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete(&self, prompt: &str, _context: &str) -> Result<String, ModelError> {
        lock(&self.prompts).push(prompt.to_string());

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let mut rules = lock(&self.rules);
        let Some(rule) = rules.iter_mut().find(|r| prompt.contains(&r.pattern)) else {
            return Ok(self.default_response.clone());
        };

        match &mut rule.reply {
            Reply::Fixed(response) => Ok(response.clone()),
            Reply::Sequence(responses) => {
                let response = if responses.len() > 1 {
                    responses.pop_front()
                } else {
                    responses.front().cloned()
                };
                Ok(response.unwrap_or_else(|| self.default_response.clone()))
            }
            Reply::Error(reason) => Err(ModelError::new(*reason, format!("Mock error for '{}'", rule.pattern))),
        }
    }

    fn complete_structured(&self, prompt: &str, context: &str, _schema: &str) -> Result<String, ModelError> {
        // The mock ignores the schema so scripted answers match on the bare prompt
        self.complete(prompt, context)
    }
}
