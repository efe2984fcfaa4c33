//! Category operations
//!
//! Global categories (user_id NULL) are shared by everyone and editable
//! only by admins. Users see the global set plus their own.

use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{Category, CategoryKind, CategoryUpdate, NewCategory};

const CATEGORY_COLUMNS: &str = "id, user_id, name, kind, color, created_at";

/// Global categories seeded on `init`
const DEFAULT_CATEGORIES: &[(&str, CategoryKind, &str)] = &[
    ("Groceries", CategoryKind::Expense, "#10b981"),
    ("Dining", CategoryKind::Expense, "#f59e0b"),
    ("Transport", CategoryKind::Expense, "#ef4444"),
    ("Housing", CategoryKind::Expense, "#6366f1"),
    ("Utilities", CategoryKind::Expense, "#8b5cf6"),
    ("Healthcare", CategoryKind::Expense, "#ec4899"),
    ("Shopping", CategoryKind::Expense, "#14b8a6"),
    ("Entertainment", CategoryKind::Expense, "#f97316"),
    ("Subscriptions", CategoryKind::Expense, "#a855f7"),
    ("Travel", CategoryKind::Expense, "#06b6d4"),
    ("Education", CategoryKind::Expense, "#0ea5e9"),
    ("Personal Care", CategoryKind::Expense, "#84cc16"),
    ("Fees & Charges", CategoryKind::Expense, "#64748b"),
    ("Taxes", CategoryKind::Expense, "#475569"),
    ("Salary", CategoryKind::Income, "#22c55e"),
    ("Interest", CategoryKind::Income, "#16a34a"),
    ("Refunds", CategoryKind::Income, "#4ade80"),
    ("Other Income", CategoryKind::Income, "#86efac"),
    ("Transfers", CategoryKind::Transfer, "#9ca3af"),
];

impl Database {
    fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
        let kind: String = row.get(3)?;
        let created_at: String = row.get(5)?;
        Ok(Category {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: kind.parse().unwrap_or_default(),
            color: row.get(4)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// List categories visible to a user (global + own)
    pub fn list_categories(&self, user_id: &str) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM categories
            WHERE user_id IS NULL OR user_id = ?
            ORDER BY kind, name COLLATE NOCASE
            "#,
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map(params![user_id], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// List only the global categories
    pub fn list_global_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM categories WHERE user_id IS NULL ORDER BY name COLLATE NOCASE",
            CATEGORY_COLUMNS
        ))?;
        let categories = stmt
            .query_map([], Self::row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    /// Get a category by id regardless of owner
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                &format!("SELECT {} FROM categories WHERE id = ?", CATEGORY_COLUMNS),
                params![id],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Get a category the user can see, or NotFound
    pub fn get_visible_category(&self, user_id: &str, id: i64) -> Result<Category> {
        match self.get_category(id)? {
            Some(c) if c.user_id.is_none() || c.user_id.as_deref() == Some(user_id) => Ok(c),
            _ => Err(Error::NotFound(format!("Category {}", id))),
        }
    }

    /// Find a visible category by name (case-insensitive); the user's own wins
    pub fn find_category_by_name(&self, user_id: &str, name: &str) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM categories
                    WHERE (user_id IS NULL OR user_id = ?) AND name = ? COLLATE NOCASE
                    ORDER BY user_id IS NULL
                    LIMIT 1
                    "#,
                    CATEGORY_COLUMNS
                ),
                params![user_id, name.trim()],
                Self::row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Create a category, owned by `owner` or global when None
    pub fn create_category(&self, owner: Option<&str>, new: &NewCategory) -> Result<Category> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name cannot be empty".into()));
        }

        let conn = self.conn()?;
        let duplicate: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM categories
            WHERE name = ? COLLATE NOCASE AND (user_id IS NULL OR user_id = ?)
            "#,
            params![name, owner],
            |row| row.get(0),
        )?;
        if duplicate > 0 {
            return Err(Error::Conflict(format!("Category '{}' already exists", name)));
        }

        conn.execute(
            "INSERT INTO categories (user_id, name, kind, color) VALUES (?, ?, ?, ?)",
            params![owner, name, new.kind.as_str(), new.color],
        )?;
        let id = conn.last_insert_rowid();
        info!(owner = ?owner, category_id = id, name, "Created category");

        self.get_category(id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    /// Users may only change their own categories; admins may also change
    /// global ones
    fn check_category_write(&self, user_id: &str, is_admin: bool, id: i64) -> Result<Category> {
        let category = self.get_visible_category(user_id, id)?;
        if category.is_global() && !is_admin {
            return Err(Error::Forbidden(format!(
                "Category '{}' is global and cannot be modified",
                category.name
            )));
        }
        Ok(category)
    }

    /// Update a category
    pub fn update_category(
        &self,
        user_id: &str,
        is_admin: bool,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category> {
        let existing = self.check_category_write(user_id, is_admin, id)?;

        let name = match update.name.as_deref().map(str::trim) {
            Some("") => {
                return Err(Error::InvalidData("Category name cannot be empty".into()))
            }
            Some(name) => name.to_string(),
            None => existing.name,
        };
        let kind = update.kind.unwrap_or(existing.kind);
        let color = update.color.clone().or(existing.color);

        let conn = self.conn()?;
        let duplicate: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM categories
            WHERE name = ? COLLATE NOCASE AND id != ?
              AND (user_id IS NULL OR user_id IS ?)
            "#,
            params![name, id, existing.user_id],
            |row| row.get(0),
        )?;
        if duplicate > 0 {
            return Err(Error::Conflict(format!("Category '{}' already exists", name)));
        }

        conn.execute(
            "UPDATE categories SET name = ?, kind = ?, color = ? WHERE id = ?",
            params![name, kind.as_str(), color, id],
        )?;

        self.get_category(id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))
    }

    /// Delete a category
    ///
    /// Its transactions become uncategorized and keywords/rules pointing at
    /// it are removed. Returns the number of transactions affected.
    pub fn delete_category(&self, user_id: &str, is_admin: bool, id: i64) -> Result<usize> {
        self.check_category_write(user_id, is_admin, id)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let affected = tx.execute(
            "UPDATE transactions SET category_id = NULL, category_source = NULL WHERE category_id = ?",
            params![id],
        )?;
        tx.execute("DELETE FROM user_keywords WHERE category_id = ?", params![id])?;
        tx.execute("DELETE FROM category_rules WHERE category_id = ?", params![id])?;
        tx.execute("DELETE FROM categories WHERE id = ?", params![id])?;
        tx.commit()?;

        info!(user_id, category_id = id, transactions = affected, "Deleted category");
        Ok(affected)
    }

    /// Seed the global categories (idempotent)
    pub fn seed_categories(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;
        for (name, kind, color) in DEFAULT_CATEGORIES {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM categories WHERE name = ? AND user_id IS NULL",
                    params![name],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if !exists {
                conn.execute(
                    "INSERT INTO categories (user_id, name, kind, color) VALUES (NULL, ?, ?, ?)",
                    params![name, kind.as_str(), color],
                )?;
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}
