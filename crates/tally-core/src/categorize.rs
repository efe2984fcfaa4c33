//! Category assignment
//!
//! Categories are assigned by a priority cascade:
//! 1. User keywords (longest matching keyword wins)
//! 2. Global rules (priority descending, then id)
//! 3. Uncategorized
//!
//! Manual assignments are never overridden, and AI assignments are only
//! replaced when the cascade produces a match. Running the cascade twice
//! with the same keywords and rules changes nothing the second time.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{CategoryRule, CategorySource, PatternType, UserKeyword};

/// Uppercase and collapse whitespace
pub fn normalize_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// A category chosen by the cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMatch {
    pub category_id: i64,
    pub source: CategorySource,
    /// The keyword or rule pattern that matched
    pub pattern: String,
    pub keyword_id: Option<i64>,
    pub rule_id: Option<i64>,
}

/// A compiled rule pattern
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Any of the `|`-separated alternatives is a substring
    Contains(Vec<String>),
    StartsWith(String),
    Exact(String),
    Regex(Regex),
}

impl Matcher {
    /// Compile a pattern. Regexes are case-insensitive.
    pub fn compile(pattern: &str, pattern_type: PatternType) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidData("Pattern cannot be empty".into()));
        }

        Ok(match pattern_type {
            PatternType::Contains => {
                let alternatives: Vec<String> = trimmed
                    .split('|')
                    .map(normalize_text)
                    .filter(|p| !p.is_empty())
                    .collect();
                if alternatives.is_empty() {
                    return Err(Error::InvalidData("Pattern cannot be empty".into()));
                }
                Self::Contains(alternatives)
            }
            PatternType::StartsWith => Self::StartsWith(normalize_text(trimmed)),
            PatternType::Exact => Self::Exact(normalize_text(trimmed)),
            PatternType::Regex => Self::Regex(
                RegexBuilder::new(trimmed)
                    .case_insensitive(true)
                    .size_limit(1 << 20)
                    .build()?,
            ),
        })
    }

    /// Match against an already-normalized description
    pub fn is_match(&self, normalized: &str) -> bool {
        match self {
            Self::Contains(alternatives) => alternatives.iter().any(|p| normalized.contains(p)),
            Self::StartsWith(prefix) => normalized.starts_with(prefix),
            Self::Exact(value) => normalized == value,
            Self::Regex(re) => re.is_match(normalized),
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledKeyword {
    id: i64,
    category_id: i64,
    keyword: String,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    rule: CategoryRule,
    matcher: Matcher,
}

/// One user's keywords plus the global rules, compiled once
#[derive(Debug, Clone, Default)]
pub struct Categorizer {
    keywords: Vec<CompiledKeyword>,
    rules: Vec<CompiledRule>,
}

impl Categorizer {
    /// Compile keywords and rules
    ///
    /// Rules with invalid patterns are logged and skipped.
    pub fn new(keywords: Vec<UserKeyword>, rules: Vec<CategoryRule>) -> Self {
        let keywords = keywords
            .into_iter()
            .map(|k| CompiledKeyword {
                id: k.id,
                category_id: k.category_id,
                keyword: normalize_text(&k.keyword),
            })
            .filter(|k| !k.keyword.is_empty())
            .collect();

        let mut rules: Vec<CompiledRule> = rules
            .into_iter()
            .filter_map(|rule| match Matcher::compile(&rule.pattern, rule.pattern_type) {
                Ok(matcher) => Some(CompiledRule { rule, matcher }),
                Err(e) => {
                    warn!(rule_id = rule.id, pattern = %rule.pattern, "Skipping invalid rule: {}", e);
                    None
                }
            })
            .collect();
        rules.sort_by(|a, b| {
            b.rule
                .priority
                .cmp(&a.rule.priority)
                .then(a.rule.id.cmp(&b.rule.id))
        });

        Self { keywords, rules }
    }

    /// Load a user's keywords and the global rule table
    pub fn for_user(db: &Database, user_id: &str) -> Result<Self> {
        let keywords = db.list_keywords(user_id)?;
        let rules = db.list_rules()?;
        Ok(Self::new(keywords, rules))
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run the cascade on a description
    pub fn categorize(&self, description: &str) -> Option<CategoryMatch> {
        let normalized = normalize_text(description);
        if normalized.is_empty() {
            return None;
        }
        self.match_keyword(&normalized)
            .or_else(|| self.match_rule(&normalized))
    }

    fn match_keyword(&self, normalized: &str) -> Option<CategoryMatch> {
        self.keywords
            .iter()
            .filter(|k| normalized.contains(&k.keyword))
            // Longest keyword wins, ties go to the oldest keyword
            .min_by(|a, b| {
                b.keyword
                    .chars()
                    .count()
                    .cmp(&a.keyword.chars().count())
                    .then(a.id.cmp(&b.id))
            })
            .map(|k| CategoryMatch {
                category_id: k.category_id,
                source: CategorySource::Keyword,
                pattern: k.keyword.clone(),
                keyword_id: Some(k.id),
                rule_id: None,
            })
    }

    fn match_rule(&self, normalized: &str) -> Option<CategoryMatch> {
        self.rules
            .iter()
            .find(|r| r.matcher.is_match(normalized))
            .map(|r| CategoryMatch {
                category_id: r.rule.category_id,
                source: CategorySource::Rule,
                pattern: r.rule.pattern.clone(),
                keyword_id: None,
                rule_id: Some(r.rule.id),
            })
    }

    /// Describe how the cascade treats a description
    pub fn explain(&self, description: &str) -> Explanation {
        let normalized = normalize_text(description);

        let matching_keywords = self
            .keywords
            .iter()
            .filter(|k| !normalized.is_empty() && normalized.contains(&k.keyword))
            .map(|k| ExplainedKeyword {
                keyword_id: k.id,
                keyword: k.keyword.clone(),
                category_id: k.category_id,
            })
            .collect();

        let matching_rules = self
            .rules
            .iter()
            .filter(|r| !normalized.is_empty() && r.matcher.is_match(&normalized))
            .map(|r| ExplainedRule {
                rule_id: r.rule.id,
                pattern: r.rule.pattern.clone(),
                pattern_type: r.rule.pattern_type,
                priority: r.rule.priority,
                category_id: r.rule.category_id,
            })
            .collect();

        let result = self.categorize(description);
        let stage = match result.as_ref().map(|m| m.source) {
            Some(CategorySource::Keyword) => MatchStage::Keyword,
            Some(_) => MatchStage::Rule,
            None => MatchStage::Uncategorized,
        };

        Explanation {
            description: description.to_string(),
            normalized,
            stage,
            result,
            matching_keywords,
            matching_rules,
        }
    }
}

/// Which step of the cascade decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStage {
    Keyword,
    Rule,
    Uncategorized,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainedKeyword {
    pub keyword_id: i64,
    pub keyword: String,
    pub category_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainedRule {
    pub rule_id: i64,
    pub pattern: String,
    pub pattern_type: PatternType,
    pub priority: i32,
    pub category_id: i64,
}

/// Cascade trace for one description
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub description: String,
    pub normalized: String,
    pub stage: MatchStage,
    /// The winning match, if any
    pub result: Option<CategoryMatch>,
    /// Every keyword that matched (the winner is the longest)
    pub matching_keywords: Vec<ExplainedKeyword>,
    /// Every rule that matched, in evaluation order
    pub matching_rules: Vec<ExplainedRule>,
}

/// Which transactions a recategorization run looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecategorizeScope {
    #[default]
    All,
    Uncategorized,
    Import(i64),
}

impl RecategorizeScope {
    /// Build a scope from its name and an optional import id
    pub fn parse(scope: &str, import_id: Option<i64>) -> Result<Self> {
        match (scope.to_lowercase().as_str(), import_id) {
            (_, Some(id)) => Ok(Self::Import(id)),
            ("all", None) => Ok(Self::All),
            ("uncategorized", None) => Ok(Self::Uncategorized),
            ("import", None) => Err(Error::InvalidData(
                "Scope 'import' requires an import id".into(),
            )),
            (other, None) => Err(Error::InvalidData(format!(
                "Unknown scope: {} (valid: all, uncategorized, import)",
                other
            ))),
        }
    }
}

/// Outcome of a recategorization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecategorizeResult {
    /// Transactions examined
    pub processed: usize,
    /// Transactions whose category or source changed
    pub changed: usize,
    pub unchanged: usize,
    /// Manual assignments left alone
    pub skipped_manual: usize,
    /// Transactions left without a category after the run
    pub uncategorized: usize,
}

/// Re-run the cascade over a user's transactions
///
/// Only rows whose (category, source) actually change are written, in a
/// single SQLite transaction.
pub fn recategorize(
    db: &Database,
    user_id: &str,
    scope: RecategorizeScope,
) -> Result<RecategorizeResult> {
    let categorizer = Categorizer::for_user(db, user_id)?;
    let candidates = db.list_categorization_candidates(user_id, scope)?;
    debug!(
        user_id,
        scope = ?scope,
        candidates = candidates.len(),
        keywords = categorizer.keyword_count(),
        rules = categorizer.rule_count(),
        "Recategorizing"
    );

    let mut result = RecategorizeResult::default();
    let mut updates = Vec::new();

    for tx in candidates {
        result.processed += 1;

        if tx.category_source == Some(CategorySource::Manual) {
            result.skipped_manual += 1;
            continue;
        }

        let target = match categorizer.categorize(&tx.description) {
            Some(m) => (Some(m.category_id), Some(m.source)),
            // AI suggestions stick until a keyword or rule says otherwise
            None if tx.category_source == Some(CategorySource::Ai) => {
                (tx.category_id, tx.category_source)
            }
            None => (None, None),
        };

        if target.0.is_none() {
            result.uncategorized += 1;
        }

        if target == (tx.category_id, tx.category_source) {
            result.unchanged += 1;
        } else {
            result.changed += 1;
            updates.push((tx.id, target.0, target.1));
        }
    }

    db.apply_category_updates(&updates)?;

    info!(
        user_id,
        processed = result.processed,
        changed = result.changed,
        skipped_manual = result.skipped_manual,
        uncategorized = result.uncategorized,
        "Recategorization complete"
    );
    Ok(result)
}
