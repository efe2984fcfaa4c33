//! Transaction operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

use super::transaction_filter::TransactionFilter;
use super::{parse_date_column, parse_datetime, Database};
use crate::categorize::RecategorizeScope;
use crate::error::{Error, Result};
use crate::models::{CategorySource, NewTransaction, Transaction, TransactionWithDetails};

const TX_COLUMNS: &str = "t.id, t.user_id, t.bank_id, t.import_id, t.date, t.description, t.amount, \
     t.currency, t.balance, t.reference, t.category_id, t.category_source, t.import_hash, \
     t.original_data, t.created_at";

/// The fields the categorization cascade needs from a transaction
#[derive(Debug, Clone, PartialEq)]
pub struct CategorizationCandidate {
    pub id: i64,
    pub description: String,
    pub category_id: Option<i64>,
    pub category_source: Option<CategorySource>,
}

fn parse_source(value: Option<String>) -> Option<CategorySource> {
    value.and_then(|s| s.parse().ok())
}

impl Database {
    pub(crate) fn row_to_transaction(row: &Row) -> rusqlite::Result<Transaction> {
        let date: String = row.get(4)?;
        let created_at: String = row.get(14)?;
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            bank_id: row.get(2)?,
            import_id: row.get(3)?,
            date: parse_date_column(4, &date)?,
            description: row.get(5)?,
            amount: row.get(6)?,
            currency: row.get(7)?,
            balance: row.get(8)?,
            reference: row.get(9)?,
            category_id: row.get(10)?,
            category_source: parse_source(row.get(11)?),
            import_hash: row.get(12)?,
            original_data: row.get(13)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// Insert a transaction (skips duplicates based on import_hash)
    ///
    /// Duplicates are scoped to (user, bank): the same statement imported
    /// into two banks yields two sets of transactions.
    pub fn insert_transaction(
        &self,
        user_id: &str,
        bank_id: i64,
        import_id: Option<i64>,
        currency: &str,
        tx: &NewTransaction,
    ) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM transactions WHERE user_id = ? AND bank_id = ? AND import_hash = ?",
                params![user_id, bank_id, tx.import_hash],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            return Ok(None);
        }

        conn.execute(
            r#"
            INSERT INTO transactions (user_id, bank_id, import_id, date, description, amount,
                                      currency, balance, reference, import_hash, original_data)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                user_id,
                bank_id,
                import_id,
                tx.date.to_string(),
                tx.description,
                tx.amount,
                currency,
                tx.balance,
                tx.reference,
                tx.import_hash,
                tx.original_data,
            ],
        )?;

        Ok(Some(conn.last_insert_rowid()))
    }

    /// Get one of a user's transactions
    pub fn get_transaction(&self, user_id: &str, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!(
                    "SELECT {} FROM transactions t WHERE t.id = ? AND t.user_id = ?",
                    TX_COLUMNS
                ),
                params![id, user_id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List transactions matching a filter, newest first
    pub fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionWithDetails>> {
        let conn = self.conn()?;
        let built = filter.build();

        let sql = format!(
            r#"
            SELECT {}, b.name, c.name
            FROM transactions t
            {}
            {}
            {}
            {}
            "#,
            TX_COLUMNS, built.join_clause, built.where_clause, built.order_clause, built.limit_clause
        );

        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(built.params_refs().as_slice(), |row| {
                Ok(TransactionWithDetails {
                    transaction: Self::row_to_transaction(row)?,
                    bank_name: row.get(15)?,
                    category_name: row.get(16)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count transactions matching a filter (ignores limit/offset)
    pub fn count_transactions(&self, filter: &TransactionFilter) -> Result<i64> {
        let conn = self.conn()?;
        let built = filter.build();
        let count = conn.query_row(
            &built.build_count_query(),
            built.params_refs().as_slice(),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// List a user's uncategorized transactions, newest first
    pub fn list_uncategorized(&self, user_id: &str, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions t
            WHERE t.user_id = ? AND t.category_id IS NULL
            ORDER BY t.date DESC, t.id DESC
            LIMIT ?
            "#,
            TX_COLUMNS
        ))?;
        let transactions = stmt
            .query_map(params![user_id, limit], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(transactions)
    }

    /// Load the transactions a recategorization run will examine
    pub fn list_categorization_candidates(
        &self,
        user_id: &str,
        scope: RecategorizeScope,
    ) -> Result<Vec<CategorizationCandidate>> {
        let (condition, import_id) = match scope {
            RecategorizeScope::All => ("", None),
            RecategorizeScope::Uncategorized => ("AND category_id IS NULL", None),
            RecategorizeScope::Import(id) => {
                if self.get_import(user_id, id)?.is_none() {
                    return Err(Error::NotFound(format!("Import {}", id)));
                }
                ("AND import_id = ?2", Some(id))
            }
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT id, description, category_id, category_source
            FROM transactions
            WHERE user_id = ?1 {}
            ORDER BY id
            "#,
            condition
        ))?;

        let map_row = |row: &Row| -> rusqlite::Result<CategorizationCandidate> {
            Ok(CategorizationCandidate {
                id: row.get(0)?,
                description: row.get(1)?,
                category_id: row.get(2)?,
                category_source: parse_source(row.get(3)?),
            })
        };

        let candidates = match import_id {
            Some(id) => stmt
                .query_map(params![user_id, id], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![user_id], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };
        Ok(candidates)
    }

    /// Set the category and its source on a single transaction
    pub fn update_transaction_category(
        &self,
        id: i64,
        category_id: Option<i64>,
        source: Option<CategorySource>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE transactions SET category_id = ?, category_source = ? WHERE id = ?",
            params![category_id, source.map(|s| s.as_str()), id],
        )?;
        Ok(())
    }

    /// Write a batch of category assignments in one SQLite transaction
    pub fn apply_category_updates(
        &self,
        updates: &[(i64, Option<i64>, Option<CategorySource>)],
    ) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE transactions SET category_id = ?, category_source = ? WHERE id = ?",
            )?;
            for (id, category_id, source) in updates {
                written += stmt.execute(params![category_id, source.map(|s| s.as_str()), id])?;
            }
        }
        tx.commit()?;

        debug!(written, "Applied category updates");
        Ok(written)
    }

    /// Categorize a transaction by hand
    ///
    /// A category set this way is `Manual` and survives recategorization.
    /// Clearing it (None) hands the transaction back to the cascade. With
    /// `remember`, the description becomes a user keyword for that category.
    pub fn set_transaction_category(
        &self,
        user_id: &str,
        id: i64,
        category_id: Option<i64>,
        remember: bool,
    ) -> Result<Transaction> {
        let tx = self
            .get_transaction(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))?;

        match category_id {
            Some(cid) => {
                self.get_visible_category(user_id, cid)?;
                self.update_transaction_category(id, Some(cid), Some(CategorySource::Manual))?;
                if remember {
                    let keyword = self.set_keyword(user_id, &tx.description, cid)?;
                    info!(user_id, keyword_id = keyword.id, "Remembered keyword from correction");
                }
            }
            None => {
                if remember {
                    return Err(Error::InvalidData(
                        "Cannot remember a keyword without a category".into(),
                    ));
                }
                self.update_transaction_category(id, None, None)?;
            }
        }

        self.get_transaction(user_id, id)?
            .ok_or_else(|| Error::NotFound(format!("Transaction {}", id)))
    }

    /// Delete one of a user's transactions
    pub fn delete_transaction(&self, user_id: &str, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM transactions WHERE id = ? AND user_id = ?",
            params![id, user_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Transaction {}", id)));
        }
        Ok(())
    }
}
