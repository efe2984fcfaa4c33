//! AI-assisted categorization
//!
//! An optional last resort for transactions the keyword/rule cascade could
//! not place. Suggestions are only requested explicitly (never during
//! import), and only land with source `Ai` when the caller asks to apply
//! them.
//!
//! - `CategorySuggester` trait: one description in, one category name out
//! - `AnthropicSuggester`: Claude Messages API
//! - `MockSuggester`: deterministic keyword table for tests

mod anthropic;
mod mock;
pub mod parsing;

pub use anthropic::{AnthropicSuggester, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use mock::MockSuggester;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::categorize::normalize_text;
use crate::db::Database;
use crate::error::Result;
use crate::models::CategorySource;

/// A category proposed for a description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySuggestion {
    /// One of the category names offered to the suggester
    pub category: String,
    /// 0.0 - 1.0
    #[serde(default)]
    pub confidence: f64,
}

/// A backend that maps a transaction description to a category name
#[async_trait]
pub trait CategorySuggester: Send + Sync {
    /// Pick one of `categories` for `description`
    async fn suggest(&self, description: &str, categories: &[String]) -> Result<CategorySuggestion>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Options for a suggestion run
#[derive(Debug, Clone, Copy)]
pub struct SuggestOptions {
    /// Maximum uncategorized transactions to examine
    pub limit: i64,
    /// Write accepted suggestions with source `Ai`
    pub apply: bool,
    /// Suggestions below this confidence are discarded
    pub min_confidence: f64,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            limit: 200,
            apply: false,
            min_confidence: 0.6,
        }
    }
}

/// One distinct description and what the suggester made of it
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionOutcome {
    pub description: String,
    pub transaction_ids: Vec<i64>,
    pub category_id: i64,
    pub category: String,
    pub confidence: f64,
    pub applied: bool,
}

/// Result of a suggestion run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuggestResult {
    /// Uncategorized transactions examined
    pub examined: usize,
    /// Distinct normalized descriptions sent to the suggester
    pub distinct: usize,
    pub suggestions: Vec<SuggestionOutcome>,
    /// Unknown category names or low confidence
    pub discarded: usize,
    /// Suggester calls that failed
    pub errors: usize,
    /// Transactions written with source `Ai`
    pub applied: usize,
}

/// Ask a suggester about a user's uncategorized transactions
///
/// Transactions are grouped by normalized description so each distinct
/// description costs one call.
pub async fn suggest_categories(
    db: &Database,
    suggester: &dyn CategorySuggester,
    user_id: &str,
    opts: SuggestOptions,
) -> Result<SuggestResult> {
    let transactions = db.list_uncategorized(user_id, opts.limit)?;
    let categories = db.list_categories(user_id)?;
    let names: Vec<String> = categories.iter().map(|c| c.name.clone()).collect();

    let mut groups: BTreeMap<String, (String, Vec<i64>)> = BTreeMap::new();
    for tx in &transactions {
        let key = normalize_text(&tx.description);
        if key.is_empty() {
            continue;
        }
        groups
            .entry(key)
            .or_insert_with(|| (tx.description.clone(), Vec::new()))
            .1
            .push(tx.id);
    }

    let mut result = SuggestResult {
        examined: transactions.len(),
        distinct: groups.len(),
        ..Default::default()
    };
    debug!(
        user_id,
        backend = suggester.name(),
        examined = result.examined,
        distinct = result.distinct,
        "Requesting category suggestions"
    );

    let mut updates = Vec::new();
    for (_, (description, ids)) in groups {
        let suggestion = match suggester.suggest(&description, &names).await {
            Ok(s) => s,
            Err(e) => {
                warn!(backend = suggester.name(), description = %description, "Suggestion failed: {}", e);
                result.errors += 1;
                continue;
            }
        };

        let Some(category) = categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(suggestion.category.trim()))
        else {
            debug!(description = %description, category = %suggestion.category, "Discarding unknown category");
            result.discarded += 1;
            continue;
        };

        if suggestion.confidence < opts.min_confidence {
            debug!(
                description = %description,
                confidence = suggestion.confidence,
                "Discarding low-confidence suggestion"
            );
            result.discarded += 1;
            continue;
        }

        if opts.apply {
            updates.extend(
                ids.iter()
                    .map(|id| (*id, Some(category.id), Some(CategorySource::Ai))),
            );
        }

        result.suggestions.push(SuggestionOutcome {
            description,
            transaction_ids: ids,
            category_id: category.id,
            category: category.name.clone(),
            confidence: suggestion.confidence,
            applied: opts.apply,
        });
    }

    result.applied = db.apply_category_updates(&updates)?;

    info!(
        user_id,
        backend = suggester.name(),
        suggestions = result.suggestions.len(),
        discarded = result.discarded,
        errors = result.errors,
        applied = result.applied,
        "Suggestion run complete"
    );
    Ok(result)
}
