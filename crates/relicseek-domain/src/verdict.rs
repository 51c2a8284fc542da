//! Reflection verdicts

/// Per-round judgment of whether the gathered evidence answers the query
///
/// Only used to decide the next plan or to stop; never outlives the session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReflectionVerdict {
    /// Whether the model considers the evidence sufficient
    pub sufficient: bool,

    /// Aspects still unanswered, most important first
    pub missing_aspects: Vec<String>,

    /// Model confidence in [0, 1]
    pub confidence: f64,

    /// Short explanation, for logs and round reports
    pub rationale: String,
}

impl ReflectionVerdict {
    /// Create a verdict, clamping confidence into [0, 1] and dropping blank aspects
    pub fn new(sufficient: bool, missing_aspects: Vec<String>, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            sufficient,
            missing_aspects: missing_aspects
                .into_iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            confidence,
            rationale: String::new(),
        }
    }

    /// An "insufficient, nothing specific missing" verdict
    pub fn insufficient(rationale: impl Into<String>) -> Self {
        Self {
            rationale: rationale.into(),
            ..Self::default()
        }
    }

    /// Attach a rationale
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_normalizes_inputs() {
        let verdict = ReflectionVerdict::new(false, vec!["provenance".into(), "  ".into()], 1.7);
        assert_eq!(verdict.missing_aspects, vec!["provenance".to_string()]);
        assert_eq!(verdict.confidence, 1.0);

        let verdict = ReflectionVerdict::new(true, Vec::new(), f64::NAN);
        assert_eq!(verdict.confidence, 0.0);
    }
}
