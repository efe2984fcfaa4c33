//! Per-user keyword operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{parse_datetime, Database};
use crate::categorize::normalize_text;
use crate::error::{Error, Result};
use crate::models::{UserKeyword, UserKeywordWithCategory};

const KEYWORD_COLUMNS: &str = "k.id, k.user_id, k.category_id, k.keyword, k.created_at";

impl Database {
    fn row_to_keyword(row: &Row) -> rusqlite::Result<UserKeyword> {
        let created_at: String = row.get(4)?;
        Ok(UserKeyword {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category_id: row.get(2)?,
            keyword: row.get(3)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// List a user's keywords
    pub fn list_keywords(&self, user_id: &str) -> Result<Vec<UserKeyword>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM user_keywords k WHERE k.user_id = ? ORDER BY k.keyword",
            KEYWORD_COLUMNS
        ))?;
        let keywords = stmt
            .query_map(params![user_id], Self::row_to_keyword)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    /// List a user's keywords with their category names
    pub fn list_keywords_with_category(&self, user_id: &str) -> Result<Vec<UserKeywordWithCategory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}, c.name
            FROM user_keywords k
            JOIN categories c ON c.id = k.category_id
            WHERE k.user_id = ?
            ORDER BY k.keyword
            "#,
            KEYWORD_COLUMNS
        ))?;
        let keywords = stmt
            .query_map(params![user_id], |row| {
                Ok(UserKeywordWithCategory {
                    keyword: Self::row_to_keyword(row)?,
                    category_name: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    /// Get one of a user's keywords
    pub fn get_keyword(&self, user_id: &str, id: i64) -> Result<Option<UserKeyword>> {
        let conn = self.conn()?;
        let keyword = conn
            .query_row(
                &format!(
                    "SELECT {} FROM user_keywords k WHERE k.id = ? AND k.user_id = ?",
                    KEYWORD_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_keyword,
            )
            .optional()?;
        Ok(keyword)
    }

    fn find_keyword(&self, user_id: &str, normalized: &str) -> Result<Option<UserKeyword>> {
        let conn = self.conn()?;
        let keyword = conn
            .query_row(
                &format!(
                    "SELECT {} FROM user_keywords k WHERE k.user_id = ? AND k.keyword = ?",
                    KEYWORD_COLUMNS
                ),
                params![user_id, normalized],
                Self::row_to_keyword,
            )
            .optional()?;
        Ok(keyword)
    }

    /// Create a keyword; the category must be visible to the user
    pub fn create_keyword(&self, user_id: &str, keyword: &str, category_id: i64) -> Result<UserKeyword> {
        let normalized = normalize_text(keyword);
        if normalized.is_empty() {
            return Err(Error::InvalidData("Keyword cannot be empty".into()));
        }
        self.get_visible_category(user_id, category_id)?;
        if self.find_keyword(user_id, &normalized)?.is_some() {
            return Err(Error::Conflict(format!("Keyword '{}' already exists", normalized)));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO user_keywords (user_id, category_id, keyword) VALUES (?, ?, ?)",
            params![user_id, category_id, normalized],
        )?;
        let id = conn.last_insert_rowid();
        info!(user_id, keyword_id = id, category_id, "Created keyword");

        self.get_keyword(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Keyword {}", id)))
    }

    /// Create a keyword or point an existing one at a new category
    pub fn set_keyword(&self, user_id: &str, keyword: &str, category_id: i64) -> Result<UserKeyword> {
        let normalized = normalize_text(keyword);
        if normalized.is_empty() {
            return Err(Error::InvalidData("Keyword cannot be empty".into()));
        }
        self.get_visible_category(user_id, category_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO user_keywords (user_id, category_id, keyword) VALUES (?, ?, ?)
            ON CONFLICT(user_id, keyword) DO UPDATE SET category_id = excluded.category_id
            "#,
            params![user_id, category_id, normalized],
        )?;

        self.find_keyword(user_id, &normalized)?
            .ok_or_else(|| Error::NotFound(format!("Keyword '{}'", normalized)))
    }

    /// Delete one of a user's keywords
    pub fn delete_keyword(&self, user_id: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM user_keywords WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Keyword {}", id)));
        }
        Ok(())
    }
}
