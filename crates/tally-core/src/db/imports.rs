//! Import history operations

use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::import::SkippedRow;
use crate::models::{ImportRecord, StatementFormat};

const IMPORT_COLUMNS: &str = "id, user_id, bank_id, filename, format, rows_parsed, rows_skipped, \
     imported, duplicates, categorized, created_at";

/// Final counters for an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub rows_parsed: i64,
    pub rows_skipped: i64,
    pub imported: i64,
    pub duplicates: i64,
    pub categorized: i64,
}

/// An import with the rows its parser skipped
#[derive(Debug, Clone, Serialize)]
pub struct ImportDetails {
    #[serde(flatten)]
    pub import: ImportRecord,
    pub skipped: Vec<SkippedRow>,
}

impl Database {
    fn row_to_import(row: &Row) -> rusqlite::Result<ImportRecord> {
        let format: String = row.get(4)?;
        let created_at: String = row.get(10)?;
        Ok(ImportRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            bank_id: row.get(2)?,
            filename: row.get(3)?,
            format: format.parse().unwrap_or(StatementFormat::Csv),
            rows_parsed: row.get(5)?,
            rows_skipped: row.get(6)?,
            imported: row.get(7)?,
            duplicates: row.get(8)?,
            categorized: row.get(9)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Start an import record; counters are filled in by `finish_import`
    pub fn create_import(
        &self,
        user_id: &str,
        bank_id: i64,
        filename: Option<&str>,
        format: StatementFormat,
    ) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO imports (user_id, bank_id, filename, format) VALUES (?, ?, ?, ?)",
            params![user_id, bank_id, filename, format.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record final counters and the skipped rows
    pub fn finish_import(&self, id: i64, counts: &ImportCounts, skipped: &[SkippedRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            UPDATE imports SET
                rows_parsed = ?,
                rows_skipped = ?,
                imported = ?,
                duplicates = ?,
                categorized = ?
            WHERE id = ?
            "#,
            params![
                counts.rows_parsed,
                counts.rows_skipped,
                counts.imported,
                counts.duplicates,
                counts.categorized,
                id,
            ],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO import_skipped_rows (import_id, row_number, reason) VALUES (?, ?, ?)",
            )?;
            for row in skipped {
                stmt.execute(params![id, row.row as i64, row.reason])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// List a user's imports, newest first
    pub fn list_imports(&self, user_id: &str, limit: i64) -> Result<Vec<ImportRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM imports
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
            IMPORT_COLUMNS
        ))?;
        let imports = stmt
            .query_map(params![user_id, limit], Self::row_to_import)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(imports)
    }

    /// Get one of a user's imports
    pub fn get_import(&self, user_id: &str, id: i64) -> Result<Option<ImportRecord>> {
        let conn = self.conn()?;
        let import = conn
            .query_row(
                &format!("SELECT {} FROM imports WHERE id = ? AND user_id = ?", IMPORT_COLUMNS),
                params![id, user_id],
                Self::row_to_import,
            )
            .optional()?;
        Ok(import)
    }

    /// Get an import together with its skipped rows
    pub fn get_import_details(&self, user_id: &str, id: i64) -> Result<Option<ImportDetails>> {
        let Some(import) = self.get_import(user_id, id)? else {
            return Ok(None);
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT row_number, reason FROM import_skipped_rows WHERE import_id = ? ORDER BY row_number",
        )?;
        let skipped = stmt
            .query_map(params![id], |row| {
                let number: i64 = row.get(0)?;
                Ok(SkippedRow {
                    row: number as usize,
                    reason: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(ImportDetails { import, skipped }))
    }

    /// Delete an import and every transaction it brought in
    pub fn delete_import(&self, user_id: &str, id: i64) -> Result<usize> {
        if self.get_import(user_id, id)?.is_none() {
            return Err(Error::NotFound(format!("Import {}", id)));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM transactions WHERE import_id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        tx.execute("DELETE FROM import_skipped_rows WHERE import_id = ?", params![id])?;
        tx.execute("DELETE FROM imports WHERE id = ?", params![id])?;
        tx.commit()?;

        info!(user_id, import_id = id, transactions = removed, "Deleted import");
        Ok(removed)
    }
}
