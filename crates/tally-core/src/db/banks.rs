//! Bank operations (per-user statement sources)

use chrono::format::{Item, StrftimeItems};
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{AmountSign, Bank, BankUpdate, NewBank};

const BANK_COLUMNS: &str = "id, user_id, name, currency, date_format, amount_sign, created_at";

/// Reject chrono format strings that contain invalid specifiers
fn validate_date_format(fmt: &str) -> Result<()> {
    if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidData(format!("Invalid date format: {}", fmt)));
    }
    Ok(())
}

impl Database {
    fn row_to_bank(row: &Row) -> rusqlite::Result<Bank> {
        let amount_sign: String = row.get(5)?;
        let created_at: String = row.get(6)?;
        Ok(Bank {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            currency: row.get(3)?,
            date_format: row.get(4)?,
            amount_sign: amount_sign.parse().unwrap_or(AmountSign::Normal),
            created_at: parse_datetime(&created_at),
        })
    }

    /// Create a bank for a user
    pub fn create_bank(&self, user_id: &str, bank: &NewBank) -> Result<Bank> {
        let name = bank.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Bank name cannot be empty".into()));
        }
        let currency = self.require_currency(&bank.currency)?;
        let date_format = bank
            .date_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());
        if let Some(fmt) = date_format {
            validate_date_format(fmt)?;
        }
        if self.find_bank_by_name(user_id, name)?.is_some() {
            return Err(Error::Conflict(format!("Bank '{}' already exists", name)));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO banks (user_id, name, currency, date_format, amount_sign)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![user_id, name, currency, date_format, bank.amount_sign.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        info!(user_id, bank_id = id, name, "Created bank");

        self.get_bank(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Bank {}", id)))
    }

    /// Get one of a user's banks
    pub fn get_bank(&self, user_id: &str, id: i64) -> Result<Option<Bank>> {
        let conn = self.conn()?;
        let bank = conn
            .query_row(
                &format!("SELECT {} FROM banks WHERE id = ? AND user_id = ?", BANK_COLUMNS),
                params![id, user_id],
                Self::row_to_bank,
            )
            .optional()?;
        Ok(bank)
    }

    /// Find a user's bank by name (case-insensitive)
    pub fn find_bank_by_name(&self, user_id: &str, name: &str) -> Result<Option<Bank>> {
        let conn = self.conn()?;
        let bank = conn
            .query_row(
                &format!(
                    "SELECT {} FROM banks WHERE user_id = ? AND name = ? COLLATE NOCASE",
                    BANK_COLUMNS
                ),
                params![user_id, name.trim()],
                Self::row_to_bank,
            )
            .optional()?;
        Ok(bank)
    }

    /// List a user's banks
    pub fn list_banks(&self, user_id: &str) -> Result<Vec<Bank>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM banks WHERE user_id = ? ORDER BY name COLLATE NOCASE",
            BANK_COLUMNS
        ))?;
        let banks = stmt
            .query_map(params![user_id], Self::row_to_bank)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(banks)
    }

    /// Update one of a user's banks
    pub fn update_bank(&self, user_id: &str, id: i64, update: &BankUpdate) -> Result<Bank> {
        let existing = self
            .get_bank(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Bank {}", id)))?;

        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(Error::InvalidData("Bank name cannot be empty".into())),
            Some(name) => {
                if let Some(other) = self.find_bank_by_name(user_id, name)? {
                    if other.id != id {
                        return Err(Error::Conflict(format!("Bank '{}' already exists", name)));
                    }
                }
                name.to_string()
            }
            None => existing.name,
        };
        let currency = match update.currency.as_deref() {
            Some(code) => self.require_currency(code)?,
            None => existing.currency,
        };
        let date_format = match update.date_format.as_deref().map(str::trim) {
            Some("") => None,
            Some(fmt) => {
                validate_date_format(fmt)?;
                Some(fmt.to_string())
            }
            None => existing.date_format,
        };
        let amount_sign = update.amount_sign.unwrap_or(existing.amount_sign);

        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE banks SET name = ?, currency = ?, date_format = ?, amount_sign = ?
            WHERE id = ? AND user_id = ?
            "#,
            params![name, currency, date_format, amount_sign.as_str(), id, user_id],
        )?;

        self.get_bank(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Bank {}", id)))
    }

    /// Delete one of a user's banks
    ///
    /// Refused while the bank has transactions unless `force` is set, in
    /// which case its transactions and imports go with it.
    pub fn delete_bank(&self, user_id: &str, id: i64, force: bool) -> Result<usize> {
        if self.get_bank(user_id, id)?.is_none() {
            return Err(Error::NotFound(format!("Bank {}", id)));
        }

        let mut conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE bank_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        if count > 0 && !force {
            return Err(Error::Conflict(format!(
                "Bank has {} transactions; delete with force to remove them too",
                count
            )));
        }

        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM transactions WHERE bank_id = ?", params![id])?;
        tx.execute("DELETE FROM imports WHERE bank_id = ?", params![id])?;
        tx.execute(
            "DELETE FROM banks WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        tx.commit()?;

        info!(user_id, bank_id = id, transactions = removed, "Deleted bank");
        Ok(removed)
    }
}
