//! Transaction filter builder for constructing dynamic SQL queries
//!
//! Shared by `list_transactions` and `count_transactions` so both see the
//! same WHERE clause.

use chrono::NaiveDate;

/// Builder for constructing transaction query filters
///
/// Every filter is scoped to one user; `user_id` is always applied.
#[derive(Debug, Default, Clone)]
pub struct TransactionFilter<'query> {
    pub user_id: &'query str,
    pub bank_id: Option<i64>,
    pub category_id: Option<i64>,
    pub import_id: Option<i64>,
    pub uncategorized: bool,
    pub search: Option<&'query str>,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Result of building a filter - contains SQL components and parameters
pub struct FilterResult {
    /// JOIN clause for bank and category names
    pub join_clause: &'static str,
    /// WHERE clause including "WHERE" keyword
    pub where_clause: String,
    /// ORDER BY clause including "ORDER BY" keyword
    pub order_clause: String,
    /// LIMIT/OFFSET clause (empty when unpaginated)
    pub limit_clause: String,
    /// Parameters for the query (boxed for rusqlite compatibility)
    pub params: Vec<Box<dyn rusqlite::ToSql>>,
}

impl<'query> TransactionFilter<'query> {
    /// Create a filter for a user's transactions
    pub fn new(user_id: &'query str) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Set bank_id filter
    pub fn bank_id(mut self, id: Option<i64>) -> Self {
        self.bank_id = id;
        self
    }

    /// Set category_id filter
    pub fn category_id(mut self, id: Option<i64>) -> Self {
        self.category_id = id;
        self
    }

    /// Set import_id filter
    pub fn import_id(mut self, id: Option<i64>) -> Self {
        self.import_id = id;
        self
    }

    /// Only transactions with no category (overrides category_id)
    pub fn uncategorized(mut self, value: bool) -> Self {
        self.uncategorized = value;
        self
    }

    /// Set search query (case-insensitive substring of the description)
    pub fn search(mut self, query: Option<&'query str>) -> Self {
        self.search = query;
        self
    }

    /// Set inclusive date range filter
    pub fn date_range(mut self, range: Option<(NaiveDate, NaiveDate)>) -> Self {
        self.date_range = range;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<i64>) -> Self {
        self.offset = offset;
        self
    }

    /// Build the filter components
    pub fn build(&self) -> FilterResult {
        let mut conditions = vec!["t.user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(self.user_id.to_string())];

        if let Some(bid) = self.bank_id {
            conditions.push("t.bank_id = ?".to_string());
            params.push(Box::new(bid));
        }

        if let Some(iid) = self.import_id {
            conditions.push("t.import_id = ?".to_string());
            params.push(Box::new(iid));
        }

        if self.uncategorized {
            conditions.push("t.category_id IS NULL".to_string());
        } else if let Some(cid) = self.category_id {
            conditions.push("t.category_id = ?".to_string());
            params.push(Box::new(cid));
        }

        if let Some(q) = self.search {
            if !q.trim().is_empty() {
                conditions.push("t.description LIKE ? COLLATE NOCASE".to_string());
                params.push(Box::new(format!("%{}%", q.trim())));
            }
        }

        if let Some((from_date, to_date)) = self.date_range {
            conditions.push("t.date >= ? AND t.date <= ?".to_string());
            params.push(Box::new(from_date.to_string()));
            params.push(Box::new(to_date.to_string()));
        }

        let limit_clause = match (self.limit, self.offset) {
            (Some(limit), offset) => format!("LIMIT {} OFFSET {}", limit.max(0), offset.unwrap_or(0).max(0)),
            (None, Some(offset)) => format!("LIMIT -1 OFFSET {}", offset.max(0)),
            (None, None) => String::new(),
        };

        FilterResult {
            join_clause: "JOIN banks b ON b.id = t.bank_id LEFT JOIN categories c ON c.id = t.category_id",
            where_clause: format!("WHERE {}", conditions.join(" AND ")),
            order_clause: "ORDER BY t.date DESC, t.id DESC".to_string(),
            limit_clause,
            params,
        }
    }
}

impl FilterResult {
    /// Build a COUNT query
    pub fn build_count_query(&self) -> String {
        format!("SELECT COUNT(*) FROM transactions t {}", self.where_clause)
    }

    /// Get parameter references for query execution
    pub fn params_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }
}
