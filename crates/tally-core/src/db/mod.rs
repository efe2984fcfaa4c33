//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `users` - Profiles mirrored from the identity provider
//! - `currencies` - ISO-4217 currency table
//! - `banks` - Per-user statement sources
//! - `categories` - Global and per-user categories
//! - `rules` - Global keyword/regex rule table
//! - `keywords` - Per-user keywords
//! - `transactions` - Transaction CRUD and category assignment
//! - `imports` - Import history and skipped rows
//! - `reports` - Pivot tables and breakdowns
//! - `audit` - Audit log

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod audit;
mod banks;
mod categories;
mod currencies;
mod imports;
mod keywords;
mod reports;
mod rules;
mod transaction_filter;
mod transactions;
mod users;

pub use imports::{ImportCounts, ImportDetails};
pub use reports::{default_report_range, UNCATEGORIZED};
pub use transaction_filter::{FilterResult, TransactionFilter};
pub use transactions::CategorizationCandidate;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"tally-salt-v1-ok";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a DATE column, surfacing bad values as a conversion error
pub(crate) fn parse_date_column(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Database wrapper with connection pooling
#[derive(Clone, Debug)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new unencrypted database connection pool
    ///
    /// Only for development and tests.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"'; PRAGMA foreign_keys = ON;", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager =
                manager.with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because every pooled
    /// connection to `:memory:` would see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Seed currencies, the global categories and the default rule table
    ///
    /// Idempotent: existing rows are left alone.
    pub fn seed_defaults(&self) -> Result<()> {
        let currencies = self.seed_currencies()?;
        let categories = self.seed_categories()?;
        let rules = self.seed_default_rules()?;
        info!(currencies, categories, rules, "Seeded defaults");
        Ok(())
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS currencies (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                symbol TEXT
            );

            -- Profiles; identity lives with the upstream provider
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT,
                display_name TEXT,
                default_currency TEXT NOT NULL REFERENCES currencies(code),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS banks (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                currency TEXT NOT NULL REFERENCES currencies(code),
                date_format TEXT,
                amount_sign TEXT NOT NULL DEFAULT 'normal',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, name)
            );

            -- user_id NULL = global category
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                user_id TEXT REFERENCES users(id),
                name TEXT NOT NULL,
                kind TEXT NOT NULL DEFAULT 'expense',
                color TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_categories_owner_name
                ON categories(COALESCE(user_id, ''), name COLLATE NOCASE);

            -- Global rule table
            CREATE TABLE IF NOT EXISTS category_rules (
                id INTEGER PRIMARY KEY,
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                pattern TEXT NOT NULL,
                pattern_type TEXT NOT NULL DEFAULT 'contains',
                priority INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_category_rules_priority ON category_rules(priority DESC, id);

            -- Keywords are stored normalized (uppercase, single-spaced)
            CREATE TABLE IF NOT EXISTS user_keywords (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
                keyword TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, keyword)
            );

            CREATE TABLE IF NOT EXISTS imports (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                bank_id INTEGER NOT NULL REFERENCES banks(id) ON DELETE CASCADE,
                filename TEXT,
                format TEXT NOT NULL,
                rows_parsed INTEGER NOT NULL DEFAULT 0,
                rows_skipped INTEGER NOT NULL DEFAULT 0,
                imported INTEGER NOT NULL DEFAULT 0,
                duplicates INTEGER NOT NULL DEFAULT 0,
                categorized INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_imports_user ON imports(user_id, created_at);

            CREATE TABLE IF NOT EXISTS import_skipped_rows (
                id INTEGER PRIMARY KEY,
                import_id INTEGER NOT NULL REFERENCES imports(id) ON DELETE CASCADE,
                row_number INTEGER NOT NULL,
                reason TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_import_skipped_import ON import_skipped_rows(import_id);

            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                bank_id INTEGER NOT NULL REFERENCES banks(id) ON DELETE CASCADE,
                import_id INTEGER REFERENCES imports(id) ON DELETE SET NULL,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                balance REAL,
                reference TEXT,
                category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
                category_source TEXT,                       -- keyword, rule, ai, manual
                import_hash TEXT NOT NULL,
                original_data TEXT,                         -- source row as JSON
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, bank_id, import_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(user_id, category_id);
            CREATE INDEX IF NOT EXISTS idx_transactions_import ON transactions(import_id);

            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_id, created_at);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
