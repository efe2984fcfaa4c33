//! User profile operations
//!
//! Users are created on first sight of a verified identity; nothing here
//! handles credentials.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{UserProfile, UserUpdate};

impl Database {
    fn row_to_user(row: &Row) -> rusqlite::Result<UserProfile> {
        let created_at: String = row.get(4)?;
        Ok(UserProfile {
            id: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            default_currency: row.get(3)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Get a user profile
    pub fn get_user(&self, id: &str) -> Result<Option<UserProfile>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, email, display_name, default_currency, created_at FROM users WHERE id = ?",
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Create the profile on first sight, refreshing the email when the
    /// identity provider reports one
    pub fn ensure_user(
        &self,
        id: &str,
        email: Option<&str>,
        default_currency: &str,
    ) -> Result<UserProfile> {
        if id.trim().is_empty() {
            return Err(Error::InvalidData("User id cannot be empty".into()));
        }

        if let Some(existing) = self.get_user(id)? {
            if email.is_some() && existing.email.as_deref() != email {
                let conn = self.conn()?;
                conn.execute("UPDATE users SET email = ? WHERE id = ?", params![email, id])?;
                return self
                    .get_user(id)?
                    .ok_or_else(|| Error::NotFound(format!("User {}", id)));
            }
            return Ok(existing);
        }

        let currency = self.require_currency(default_currency)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO users (id, email, default_currency) VALUES (?, ?, ?)",
            params![id, email, currency],
        )?;
        info!(user_id = id, "Created user profile");

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }

    /// Update display name and/or default currency
    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<UserProfile> {
        let existing = self
            .get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;

        let display_name = match update.display_name.as_deref().map(str::trim) {
            Some("") => None,
            Some(name) => Some(name.to_string()),
            None => existing.display_name,
        };
        let currency = match update.default_currency.as_deref() {
            Some(code) => self.require_currency(code)?,
            None => existing.default_currency,
        };

        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET display_name = ?, default_currency = ? WHERE id = ?",
            params![display_name, currency, id],
        )?;

        self.get_user(id)?
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))
    }
}
