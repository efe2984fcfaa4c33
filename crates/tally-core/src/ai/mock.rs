//! Mock suggester for testing
//!
//! Answers from a fixed keyword table and counts how often it was asked.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{CategorySuggester, CategorySuggestion};
use crate::error::{Error, Result};

/// Category returned when no table entry matches
pub const MOCK_UNKNOWN: &str = "Other";

/// Deterministic suggester
#[derive(Debug, Default)]
pub struct MockSuggester {
    /// (uppercase needle, category, confidence)
    rules: Vec<(String, String, f64)>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockSuggester {
    pub fn new() -> Self {
        Self::default()
    }

    /// A suggester whose every call fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Answer `category` for descriptions containing `needle`
    pub fn with_rule(mut self, needle: &str, category: &str, confidence: f64) -> Self {
        self.rules
            .push((needle.to_uppercase(), category.to_string(), confidence));
        self
    }

    /// Number of `suggest` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CategorySuggester for MockSuggester {
    async fn suggest(&self, description: &str, _categories: &[String]) -> Result<CategorySuggestion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Ai("mock suggester failure".into()));
        }

        let upper = description.to_uppercase();
        let suggestion = self
            .rules
            .iter()
            .find(|(needle, _, _)| upper.contains(needle.as_str()))
            .map(|(_, category, confidence)| CategorySuggestion {
                category: category.clone(),
                confidence: *confidence,
            })
            .unwrap_or_else(|| CategorySuggestion {
                category: MOCK_UNKNOWN.to_string(),
                confidence: 0.99,
            });
        Ok(suggestion)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
