//! Tally Core Library
//!
//! Shared functionality for the Tally statement tracker:
//! - Database access and migrations
//! - Statement parsers for CSV, Excel and PDF exports
//! - Keyword/rule categorization cascade
//! - Optional AI category suggestions (Claude)
//! - Monthly pivot tables and breakdown reports

pub mod ai;
pub mod categorize;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod ingest;
pub mod models;

pub use ai::{
    suggest_categories, AnthropicSuggester, CategorySuggester, CategorySuggestion,
    MockSuggester, SuggestOptions, SuggestResult,
};
pub use categorize::{recategorize, Categorizer, CategoryMatch, RecategorizeResult, RecategorizeScope};
pub use config::Config;
pub use db::{Database, TransactionFilter};
pub use error::{Error, Result};
pub use import::{detect_format, parse_statement, DateOrder, ParseOptions, ParsedStatement, SkippedRow};
pub use ingest::{ingest_statement, ImportOutcome, IngestOptions};
