//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `open_user_db` - Open the database and make sure the acting user exists
//! - `cmd_init` - Initialize the database

use anyhow::{Context, Result};
use tally_core::config::Config;
use tally_core::db::{Database, DB_KEY_ENV};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(config: &Config, no_encrypt: bool) -> Result<Database> {
    let path_str = config
        .db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        let key = config.db_key.as_deref().with_context(|| {
            format!(
                "Database encryption required. Set {} or [database] key in the config file, \
                 or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            )
        })?;
        Database::new_with_key(path_str, Some(key)).context("Failed to open database")
    }
}

/// Open the database and create the acting user's profile on first use
pub fn open_user_db(config: &Config, user_id: &str, no_encrypt: bool) -> Result<Database> {
    let db = open_db(config, no_encrypt)?;
    db.ensure_user(user_id, None, &config.default_currency)
        .context("Failed to load user profile (has `tally init` been run?)")?;
    Ok(db)
}

pub fn cmd_init(config: &Config, user_id: &str, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", config.db_path.display());

    let db = open_db(config, no_encrypt)?;

    db.seed_defaults().context("Failed to seed defaults")?;
    println!("   Seeded currencies, categories and rules");

    let profile = db
        .ensure_user(user_id, None, &config.default_currency)
        .context("Failed to create user profile")?;
    println!(
        "   User: {} (default currency {})",
        profile.id, profile.default_currency
    );

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import a statement: tally import --file statement.csv --bank Checking --create");
    println!("  2. See where it went:  tally report pivot");
    println!("  3. Start web UI:       tally serve");

    Ok(())
}
