//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, open_user_db)
//! - `import` - Statement import and import history
//! - `banks` - Bank and currency management
//! - `categories` - Categories, keywords and global rules
//! - `categorize` - Recategorization and AI suggestions
//! - `transactions` - Transaction listing and manual categories
//! - `reports` - Report generation commands
//! - `serve` - Web server command

pub mod banks;
pub mod categories;
pub mod categorize;
pub mod core;
pub mod import;
pub mod reports;
pub mod serve;
pub mod transactions;

// Re-export command functions for main.rs
pub use banks::*;
pub use categories::*;
pub use categorize::*;
pub use self::core::*;
pub use import::*;
pub use reports::*;
pub use serve::*;
pub use transactions::*;

use anyhow::{Context, Result};
use tally_core::db::Database;
use tally_core::models::{Bank, Category};

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Look up one of the user's banks by name
pub fn resolve_bank(db: &Database, user_id: &str, name: &str) -> Result<Bank> {
    db.find_bank_by_name(user_id, name)?
        .with_context(|| format!("Bank '{}' not found. See `tally banks`", name))
}

/// Look up a category visible to the user by name
pub fn resolve_category(db: &Database, user_id: &str, name: &str) -> Result<Category> {
    db.find_category_by_name(user_id, name)?
        .with_context(|| format!("Category '{}' not found. See `tally categories`", name))
}
