//! Spending reports
//!
//! Every report is scoped to one user, one currency and an inclusive date
//! range. Amounts in different currencies are never added together.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{
    BankBreakdown, CategoryBreakdown, CategoryKind, PivotRow, PivotTable, ReportFilter,
    ReportSummary,
};

/// Label used for transactions without a category
pub const UNCATEGORIZED: &str = "Uncategorized";

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// "YYYY-MM" labels for every month touched by the range, in order
pub fn month_labels(from: NaiveDate, to: NaiveDate) -> Vec<String> {
    let mut labels = Vec::new();
    let Some(mut cursor) = from.with_day(1) else {
        return labels;
    };
    while cursor <= to {
        labels.push(cursor.format("%Y-%m").to_string());
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    labels
}

/// Default report window: the first of the month eleven months before
/// `today`, through `today`
pub fn default_report_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let month_start = today.with_day(1).unwrap_or(today);
    let from = month_start
        .checked_sub_months(Months::new(11))
        .unwrap_or(month_start);
    (from, today)
}

fn kind_rank(kind: Option<CategoryKind>) -> u8 {
    match kind {
        Some(CategoryKind::Income) => 0,
        Some(CategoryKind::Expense) => 1,
        Some(CategoryKind::Transfer) => 2,
        None => 3,
    }
}

/// WHERE clause and params shared by every report query
fn report_conditions(filter: &ReportFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
    let mut conditions = vec![
        "t.user_id = ?".to_string(),
        "t.currency = ?".to_string(),
        "t.date BETWEEN ? AND ?".to_string(),
    ];
    let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(filter.user_id.clone()),
        Box::new(filter.currency.clone()),
        Box::new(filter.from.to_string()),
        Box::new(filter.to.to_string()),
    ];
    if let Some(bank_id) = filter.bank_id {
        conditions.push("t.bank_id = ?".to_string());
        params.push(Box::new(bank_id));
    }
    (format!("WHERE {}", conditions.join(" AND ")), params)
}

fn check_range(filter: &ReportFilter) -> Result<()> {
    if filter.from > filter.to {
        return Err(Error::InvalidData(format!(
            "Invalid date range: {} is after {}",
            filter.from, filter.to
        )));
    }
    Ok(())
}

impl Database {
    /// Build a report filter, resolving the currency
    ///
    /// An explicit currency wins, then the bank's currency when one bank is
    /// selected, then the user's default.
    pub fn report_filter(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        bank_id: Option<i64>,
        currency: Option<&str>,
    ) -> Result<ReportFilter> {
        let bank = match bank_id {
            Some(id) => Some(
                self.get_bank(user_id, id)?
                    .ok_or_else(|| Error::NotFound(format!("Bank {}", id)))?,
            ),
            None => None,
        };

        let currency = match (currency, bank) {
            (Some(code), _) => self.require_currency(code)?,
            (None, Some(bank)) => bank.currency,
            (None, None) => {
                self.get_user(user_id)?
                    .ok_or_else(|| Error::NotFound(format!("User {}", user_id)))?
                    .default_currency
            }
        };

        let filter = ReportFilter {
            user_id: user_id.to_string(),
            from,
            to,
            bank_id,
            currency,
        };
        check_range(&filter)?;
        Ok(filter)
    }

    /// Category × month pivot of signed sums
    pub fn pivot_table(&self, filter: &ReportFilter) -> Result<PivotTable> {
        check_range(filter)?;
        let conn = self.conn()?;
        let (where_clause, params) = report_conditions(filter);

        let sql = format!(
            r#"
            SELECT t.category_id, c.name, c.kind, strftime('%Y-%m', t.date) AS month, SUM(t.amount)
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            {}
            GROUP BY t.category_id, month
            "#,
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
            .query_map(params_refs.as_slice(), |row| {
                let kind: Option<String> = row.get(2)?;
                Ok((
                    row.get::<_, Option<i64>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    kind.and_then(|k| k.parse::<CategoryKind>().ok()),
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let months = month_labels(filter.from, filter.to);
        let month_index: HashMap<&str, usize> = months
            .iter()
            .enumerate()
            .map(|(i, m)| (m.as_str(), i))
            .collect();

        let mut rows: HashMap<Option<i64>, PivotRow> = HashMap::new();
        for (category_id, name, kind, month, sum) in cells {
            let Some(&col) = month_index.get(month.as_str()) else {
                continue;
            };
            let row = rows.entry(category_id).or_insert_with(|| PivotRow {
                category_id,
                category: name.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                kind,
                cells: vec![0.0; months.len()],
                total: 0.0,
            });
            row.cells[col] += sum;
        }

        let mut rows: Vec<PivotRow> = rows.into_values().collect();
        // Uncategorized has no kind and sorts last
        rows.sort_by(|a, b| {
            kind_rank(a.kind)
                .cmp(&kind_rank(b.kind))
                .then_with(|| a.category.to_lowercase().cmp(&b.category.to_lowercase()))
        });

        let mut column_totals = vec![0.0; months.len()];
        for row in &mut rows {
            for (i, cell) in row.cells.iter_mut().enumerate() {
                *cell = round_cents(*cell);
                column_totals[i] += *cell;
            }
            row.total = round_cents(row.cells.iter().sum());
        }
        let column_totals: Vec<f64> = column_totals.into_iter().map(round_cents).collect();
        let grand_total = round_cents(column_totals.iter().sum());

        Ok(PivotTable {
            currency: filter.currency.clone(),
            months,
            rows,
            column_totals,
            grand_total,
        })
    }

    /// Outflow per category, largest first
    pub fn spending_by_category(&self, filter: &ReportFilter) -> Result<Vec<CategoryBreakdown>> {
        check_range(filter)?;
        let conn = self.conn()?;
        let (where_clause, params) = report_conditions(filter);

        let sql = format!(
            r#"
            SELECT t.category_id, c.name, SUM(ABS(t.amount)), COUNT(*)
            FROM transactions t
            LEFT JOIN categories c ON c.id = t.category_id
            {} AND t.amount < 0
            GROUP BY t.category_id
            ORDER BY 3 DESC
            "#,
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let mut breakdown = stmt
            .query_map(params_refs.as_slice(), |row| {
                let name: Option<String> = row.get(1)?;
                Ok(CategoryBreakdown {
                    category_id: row.get(0)?,
                    category: name.unwrap_or_else(|| UNCATEGORIZED.to_string()),
                    amount: row.get(2)?,
                    transaction_count: row.get(3)?,
                    percentage: 0.0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total: f64 = breakdown.iter().map(|b| b.amount).sum();
        for item in &mut breakdown {
            item.percentage = if total > 0.0 {
                round_cents(item.amount / total * 100.0)
            } else {
                0.0
            };
            item.amount = round_cents(item.amount);
        }

        Ok(breakdown)
    }

    /// Inflow and outflow per bank
    pub fn breakdown_by_bank(&self, filter: &ReportFilter) -> Result<Vec<BankBreakdown>> {
        check_range(filter)?;
        let conn = self.conn()?;
        let (where_clause, params) = report_conditions(filter);

        let sql = format!(
            r#"
            SELECT b.id, b.name,
                   COALESCE(SUM(CASE WHEN t.amount > 0 THEN t.amount ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN t.amount < 0 THEN -t.amount ELSE 0 END), 0),
                   COUNT(*)
            FROM transactions t
            JOIN banks b ON b.id = t.bank_id
            {}
            GROUP BY b.id
            ORDER BY b.name COLLATE NOCASE
            "#,
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let banks = stmt
            .query_map(params_refs.as_slice(), |row| {
                let income: f64 = row.get(2)?;
                let expenses: f64 = row.get(3)?;
                Ok(BankBreakdown {
                    bank_id: row.get(0)?,
                    bank: row.get(1)?,
                    income: round_cents(income),
                    expenses: round_cents(expenses),
                    net: round_cents(income - expenses),
                    transaction_count: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(banks)
    }

    /// Headline numbers for the period
    pub fn summary(&self, filter: &ReportFilter) -> Result<ReportSummary> {
        check_range(filter)?;
        let conn = self.conn()?;
        let (where_clause, params) = report_conditions(filter);

        let sql = format!(
            r#"
            SELECT COALESCE(SUM(CASE WHEN t.amount > 0 THEN t.amount ELSE 0 END), 0),
                   COALESCE(SUM(CASE WHEN t.amount < 0 THEN -t.amount ELSE 0 END), 0),
                   COUNT(*),
                   COALESCE(SUM(CASE WHEN t.category_id IS NULL THEN 1 ELSE 0 END), 0)
            FROM transactions t
            {}
            "#,
            where_clause
        );

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let (income, expenses, transaction_count, uncategorized_count): (f64, f64, i64, i64) = conn
            .query_row(&sql, params_refs.as_slice(), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;

        let net = income - expenses;
        let savings_rate = if income > 0.0 {
            round_cents(net / income)
        } else {
            0.0
        };

        Ok(ReportSummary {
            currency: filter.currency.clone(),
            from: filter.from,
            to: filter.to,
            income: round_cents(income),
            expenses: round_cents(expenses),
            net: round_cents(net),
            savings_rate,
            transaction_count,
            uncategorized_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_month_labels_are_continuous() {
        let labels = month_labels(d(2023, 11, 15), d(2024, 2, 3));
        assert_eq!(labels, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_month_labels_single_month() {
        assert_eq!(month_labels(d(2024, 3, 1), d(2024, 3, 31)), vec!["2024-03"]);
    }

    #[test]
    fn test_default_report_range_spans_twelve_months() {
        let (from, to) = default_report_range(d(2024, 3, 15));
        assert_eq!(from, d(2023, 4, 1));
        assert_eq!(to, d(2024, 3, 15));
        assert_eq!(month_labels(from, to).len(), 12);
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert_eq!(round_cents(-12.346), -12.35);
    }
}
