//! Search plans

use crate::normalize::normalize_text;
use std::collections::BTreeSet;

/// A single search to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStep {
    /// Keywords sent to the search port
    pub keywords: BTreeSet<String>,

    /// Why this step exists (facet or missing aspect)
    pub purpose: String,

    /// Round that issued the step (>= 1)
    pub round: u32,
}

impl SearchStep {
    /// Create a step, dropping blank keywords
    pub fn new<I, S>(keywords: I, purpose: impl Into<String>, round: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .map(|k: String| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            purpose: purpose.into(),
            round,
        }
    }

    /// Keywords joined into a query string
    pub fn query_string(&self) -> String {
        self.keywords.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// Normalized tokens of all keywords
    pub fn tokens(&self) -> BTreeSet<String> {
        self.keywords
            .iter()
            .flat_map(|k| {
                normalize_text(k)
                    .split(' ')
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Whether this step searches for everything `other` searches for
    ///
    /// Equal keyword sets count as a superset.
    pub fn is_superset_of(&self, other: &SearchStep) -> bool {
        let mine = self.tokens();
        let theirs = other.tokens();
        !theirs.is_empty() && mine.is_superset(&theirs)
    }
}

/// The steps issued for one round
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchPlan {
    /// Round number (>= 1)
    pub round: u32,

    /// Steps in execution order
    pub steps: Vec<SearchStep>,
}

impl SearchPlan {
    /// Create a plan
    pub fn new(round: u32, steps: Vec<SearchStep>) -> Self {
        Self { round, steps }
    }

    /// Whether the plan has nothing to search
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}
