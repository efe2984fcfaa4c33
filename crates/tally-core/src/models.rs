//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// An ISO-4217 currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Three-letter uppercase code (e.g., "USD")
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
}

/// A user profile mirrored from the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Opaque identifier issued by the identity provider (JWT `sub`)
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Currency used for reports when none is requested
    pub default_currency: String,
    pub created_at: DateTime<Utc>,
}

/// Changes to a user profile; None leaves a field as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub display_name: Option<String>,
    pub default_currency: Option<String>,
}

// ========== Banks ==========

/// How a bank export signs its amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AmountSign {
    /// Outflows are negative (checking accounts, most exports)
    #[default]
    Normal,
    /// Outflows are positive (many credit card exports)
    Inverted,
}

impl AmountSign {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Inverted => "inverted",
        }
    }

    /// Apply this convention to a parsed amount
    pub fn apply(&self, amount: f64) -> f64 {
        match self {
            Self::Normal => amount,
            Self::Inverted => -amount,
        }
    }
}

impl std::str::FromStr for AmountSign {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "inverted" | "invert" => Ok(Self::Inverted),
            _ => Err(format!("Unknown amount sign: {} (valid: normal, inverted)", s)),
        }
    }
}

impl std::fmt::Display for AmountSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bank (statement source) owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    /// Currency of the account's statements
    pub currency: String,
    /// Explicit chrono date format (e.g., "%d/%m/%Y"); inferred when None
    pub date_format: Option<String>,
    pub amount_sign: AmountSign,
    pub created_at: DateTime<Utc>,
}

/// A new bank to be created
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBank {
    pub name: String,
    pub currency: String,
    pub date_format: Option<String>,
    #[serde(default)]
    pub amount_sign: AmountSign,
}

/// Changes to a bank; None leaves a field as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BankUpdate {
    pub name: Option<String>,
    pub currency: Option<String>,
    /// Empty string clears the explicit format
    pub date_format: Option<String>,
    pub amount_sign: Option<AmountSign>,
}

// ========== Categories ==========

/// What kind of money movement a category represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    #[default]
    Expense,
    Income,
    Transfer,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!(
                "Unknown category kind: {} (valid: expense, income, transfer)",
                s
            )),
        }
    }
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transaction category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    /// Owner of a custom category; None for the global set
    pub user_id: Option<String>,
    pub name: String,
    pub kind: CategoryKind,
    /// Optional color for UI display (e.g., "#10b981")
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn is_global(&self) -> bool {
        self.user_id.is_none()
    }
}

/// A new category to be created
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub kind: CategoryKind,
    pub color: Option<String>,
}

/// Changes to a category; None leaves a field as is
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub kind: Option<CategoryKind>,
    pub color: Option<String>,
}

/// Pattern matching type for category rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Case-insensitive substring match (supports | for OR)
    Contains,
    /// Case-insensitive prefix match
    StartsWith,
    /// Exact string match (case-insensitive)
    Exact,
    /// Regular expression match (case-insensitive)
    Regex,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "starts_with",
            Self::Exact => "exact",
            Self::Regex => "regex",
        }
    }
}

impl std::str::FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" => Ok(Self::Contains),
            "starts_with" | "startswith" | "prefix" => Ok(Self::StartsWith),
            "exact" => Ok(Self::Exact),
            "regex" => Ok(Self::Regex),
            _ => Err(format!(
                "Unknown pattern type: {} (valid: contains, starts_with, exact, regex)",
                s
            )),
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A global keyword/regex rule mapping descriptions to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub id: i64,
    pub category_id: i64,
    pub pattern: String,
    pub pattern_type: PatternType,
    /// Higher priority rules are checked first
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

/// A rule with its category name (for display)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRuleWithCategory {
    #[serde(flatten)]
    pub rule: CategoryRule,
    pub category_name: String,
}

/// A user-defined keyword mapping descriptions to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKeyword {
    pub id: i64,
    pub user_id: String,
    pub category_id: i64,
    /// Normalized (uppercase, single-spaced) keyword
    pub keyword: String,
    pub created_at: DateTime<Utc>,
}

/// A keyword with its category name (for display)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserKeywordWithCategory {
    #[serde(flatten)]
    pub keyword: UserKeyword,
    pub category_name: String,
}

/// How a category was assigned to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategorySource {
    /// Matched a user-defined keyword
    Keyword,
    /// Matched a global rule
    Rule,
    /// Suggested by the AI backend
    Ai,
    /// Set by the user
    Manual,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Rule => "rule",
            Self::Ai => "ai",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for CategorySource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyword" => Ok(Self::Keyword),
            "rule" => Ok(Self::Rule),
            "ai" => Ok(Self::Ai),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown category source: {}", s)),
        }
    }
}

impl std::fmt::Display for CategorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ========== Transactions ==========

/// A stored transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    pub bank_id: i64,
    pub import_id: Option<i64>,
    pub date: NaiveDate,
    pub description: String,
    /// Negative = outflow, positive = inflow
    pub amount: f64,
    pub currency: String,
    /// Running balance reported by the statement, when present
    pub balance: Option<f64>,
    /// Bank-provided reference number, when present
    pub reference: Option<String>,
    pub category_id: Option<i64>,
    pub category_source: Option<CategorySource>,
    /// Hash for deduplication
    pub import_hash: String,
    /// Original statement row as JSON (header -> cell)
    pub original_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A transaction with its category and bank names (for listing)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionWithDetails {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub bank_name: String,
    pub category_name: Option<String>,
}

/// A normalized transaction produced by a statement parser (before DB insertion)
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount: f64,
    /// Running balance after this transaction, when the statement has one
    pub balance: Option<f64>,
    /// Bank-provided reference number, when present
    pub reference: Option<String>,
    pub import_hash: String,
    pub original_data: Option<String>,
}

// ========== Imports ==========

/// Supported statement file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementFormat {
    Csv,
    Excel,
    Pdf,
}

impl StatementFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Excel => "excel",
            Self::Pdf => "pdf",
        }
    }
}

impl std::str::FromStr for StatementFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" | "txt" | "tsv" => Ok(Self::Csv),
            "excel" | "xlsx" | "xls" | "xlsm" | "ods" => Ok(Self::Excel),
            "pdf" => Ok(Self::Pdf),
            _ => Err(format!("Unknown statement format: {}", s)),
        }
    }
}

impl std::fmt::Display for StatementFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A completed statement import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub id: i64,
    pub user_id: String,
    pub bank_id: i64,
    pub filename: Option<String>,
    pub format: StatementFormat,
    pub rows_parsed: i64,
    pub rows_skipped: i64,
    pub imported: i64,
    pub duplicates: i64,
    pub categorized: i64,
    pub created_at: DateTime<Utc>,
}

// ========== Audit ==========

/// An audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ========== Report Models ==========

/// Common filter for reports
#[derive(Debug, Clone)]
pub struct ReportFilter {
    pub user_id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub bank_id: Option<i64>,
    pub currency: String,
}

/// One category row of a pivot table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotRow {
    /// None for the uncategorized row
    pub category_id: Option<i64>,
    pub category: String,
    pub kind: Option<CategoryKind>,
    /// One signed sum per month, aligned with `PivotTable::months`
    pub cells: Vec<f64>,
    pub total: f64,
}

/// Category × month pivot table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotTable {
    pub currency: String,
    /// Month labels ("YYYY-MM"), continuous from `from` to `to`
    pub months: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

/// Outflow for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category_id: Option<i64>,
    pub category: String,
    /// Absolute outflow
    pub amount: f64,
    pub transaction_count: i64,
    pub percentage: f64,
}

/// Inflow/outflow for one bank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankBreakdown {
    pub bank_id: i64,
    pub bank: String,
    pub income: f64,
    /// Absolute outflow
    pub expenses: f64,
    pub net: f64,
    pub transaction_count: i64,
}

/// Headline numbers for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub currency: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub income: f64,
    /// Absolute outflow
    pub expenses: f64,
    pub net: f64,
    /// net / income, 0 when there is no income
    pub savings_rate: f64,
    pub transaction_count: i64,
    pub uncategorized_count: i64,
}
