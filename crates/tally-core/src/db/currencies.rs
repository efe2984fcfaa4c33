//! Currency operations

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::models::Currency;

/// Currencies seeded on `init`
const DEFAULT_CURRENCIES: &[(&str, &str, &str)] = &[
    ("USD", "US Dollar", "$"),
    ("EUR", "Euro", "€"),
    ("GBP", "Pound Sterling", "£"),
    ("CAD", "Canadian Dollar", "$"),
    ("AUD", "Australian Dollar", "$"),
    ("MXN", "Mexican Peso", "$"),
    ("CHF", "Swiss Franc", "CHF"),
    ("JPY", "Japanese Yen", "¥"),
    ("BRL", "Brazilian Real", "R$"),
    ("ARS", "Argentine Peso", "$"),
    ("COP", "Colombian Peso", "$"),
    ("CLP", "Chilean Peso", "$"),
];

/// Normalize and validate an ISO-4217 code
pub fn validate_currency_code(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(Error::InvalidData(format!(
            "Invalid currency code '{}': expected three letters (e.g., USD)",
            code
        )));
    }
    Ok(code)
}

impl Database {
    /// List all currencies
    pub fn list_currencies(&self) -> Result<Vec<Currency>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT code, name, symbol FROM currencies ORDER BY code")?;
        let currencies = stmt
            .query_map([], |row| {
                Ok(Currency {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(currencies)
    }

    /// Get a currency by code
    pub fn get_currency(&self, code: &str) -> Result<Option<Currency>> {
        let conn = self.conn()?;
        let currency = conn
            .query_row(
                "SELECT code, name, symbol FROM currencies WHERE code = ?",
                params![code.trim().to_uppercase()],
                |row| {
                    Ok(Currency {
                        code: row.get(0)?,
                        name: row.get(1)?,
                        symbol: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(currency)
    }

    /// Ensure a currency exists, returning its normalized code
    pub(crate) fn require_currency(&self, code: &str) -> Result<String> {
        let code = validate_currency_code(code)?;
        if self.get_currency(&code)?.is_none() {
            return Err(Error::InvalidData(format!("Unknown currency: {}", code)));
        }
        Ok(code)
    }

    /// Add a currency
    pub fn create_currency(&self, code: &str, name: &str, symbol: Option<&str>) -> Result<Currency> {
        let code = validate_currency_code(code)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Currency name cannot be empty".into()));
        }
        if self.get_currency(&code)?.is_some() {
            return Err(Error::Conflict(format!("Currency {} already exists", code)));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO currencies (code, name, symbol) VALUES (?, ?, ?)",
            params![code, name, symbol],
        )?;

        Ok(Currency {
            code,
            name: name.to_string(),
            symbol: symbol.map(str::to_string),
        })
    }

    /// Delete a currency that nothing references
    pub fn delete_currency(&self, code: &str) -> Result<()> {
        let code = code.trim().to_uppercase();
        let conn = self.conn()?;

        let in_use: i64 = conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM banks WHERE currency = ?1)
                 + (SELECT COUNT(*) FROM users WHERE default_currency = ?1)
                 + (SELECT COUNT(*) FROM transactions WHERE currency = ?1)
            "#,
            params![code],
            |row| row.get(0),
        )?;
        if in_use > 0 {
            return Err(Error::Conflict(format!(
                "Currency {} is in use and cannot be deleted",
                code
            )));
        }

        let deleted = conn.execute("DELETE FROM currencies WHERE code = ?", params![code])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Currency {}", code)));
        }
        Ok(())
    }

    /// Seed the default currencies (idempotent)
    pub fn seed_currencies(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;
        for (code, name, symbol) in DEFAULT_CURRENCIES {
            inserted += conn.execute(
                "INSERT OR IGNORE INTO currencies (code, name, symbol) VALUES (?, ?, ?)",
                params![code, name, symbol],
            )?;
        }
        Ok(inserted)
    }
}
