//! Grid of cells → transactions, shared by the CSV and Excel readers

use tracing::debug;

use super::amount::parse_amount;
use super::columns::{has_header_candidate, infer_columns, locate_header, AmountColumns, ColumnMap};
use super::{normalize_whitespace, row_to_json, HashTracker, ParseOptions, ParsedStatement, SkippedRow};
use crate::error::Result;
use crate::models::{NewTransaction, StatementFormat};

pub(super) fn parse_rows(
    rows: Vec<Vec<String>>,
    format: StatementFormat,
    opts: &ParseOptions,
) -> Result<ParsedStatement> {
    let (start, headers, columns) = match locate_header(&rows) {
        Ok(found) => {
            debug!(row = found.row, columns = ?found.columns, "Located header row");
            (found.row + 1, found.headers, found.columns)
        }
        // A header we could not complete is an error, not a headerless file
        Err(err) if has_header_candidate(&rows) => return Err(err),
        Err(err) => match infer_columns(&rows) {
            Some(columns) => {
                debug!(columns = ?columns, "No header row, inferred columns from data");
                let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
                let headers = (1..=width).map(|i| format!("column_{}", i)).collect();
                (0, headers, columns)
            }
            None => return Err(err),
        },
    };

    let data = rows.get(start..).unwrap_or_default();
    let date_parser = opts.date_parser(
        data.iter()
            .filter_map(|r| r.get(columns.date))
            .map(String::as_str),
    );
    debug!(order = %date_parser.order(), "Date order for statement");

    let mut transactions = Vec::new();
    let mut skipped = Vec::new();
    let mut hashes = HashTracker::default();

    for (offset, row) in data.iter().enumerate() {
        let row_number = start + offset + 1;

        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");

        let date_raw = cell(columns.date);
        if date_raw.is_empty() {
            skipped.push(SkippedRow {
                row: row_number,
                reason: "missing date".into(),
            });
            continue;
        }
        let Some(date) = date_parser.parse(date_raw) else {
            skipped.push(SkippedRow {
                row: row_number,
                reason: format!("unparseable date '{}'", date_raw),
            });
            continue;
        };

        let amount = match row_amount(&columns, &cell) {
            Ok(amount) => opts.amount_sign.apply(amount),
            Err(reason) => {
                skipped.push(SkippedRow {
                    row: row_number,
                    reason,
                });
                continue;
            }
        };

        let mut description = normalize_whitespace(cell(columns.description));
        if description.is_empty() {
            if let Some(memo) = columns.memo {
                description = normalize_whitespace(cell(memo));
            }
        }
        if description.is_empty() {
            skipped.push(SkippedRow {
                row: row_number,
                reason: "missing description".into(),
            });
            continue;
        }

        let balance = columns
            .balance
            .map(cell)
            .filter(|s| !s.is_empty())
            .and_then(|s| parse_amount(s).ok());
        let reference = columns
            .reference
            .map(cell)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let import_hash = hashes.next(date, &description, amount);

        transactions.push(NewTransaction {
            date,
            description,
            amount,
            balance,
            reference,
            import_hash,
            original_data: Some(row_to_json(&headers, row)),
        });
    }

    Ok(ParsedStatement {
        format,
        transactions,
        skipped,
    })
}

/// Signed amount of a row, or the reason it has none
fn row_amount<'a>(
    columns: &ColumnMap,
    cell: &impl Fn(usize) -> &'a str,
) -> std::result::Result<f64, String> {
    match columns.amount {
        AmountColumns::Single(idx) => {
            let raw = cell(idx);
            if raw.is_empty() {
                return Err("missing amount".into());
            }
            parse_amount(raw).map_err(|_| format!("unparseable amount '{}'", raw))
        }
        AmountColumns::Split { debit, credit } => {
            let parse_side = |idx: Option<usize>| -> std::result::Result<Option<f64>, String> {
                let Some(idx) = idx else { return Ok(None) };
                let raw = cell(idx);
                if raw.is_empty() {
                    return Ok(None);
                }
                parse_amount(raw)
                    .map(Some)
                    .map_err(|_| format!("unparseable amount '{}'", raw))
            };

            let debit = parse_side(debit)?;
            let credit = parse_side(credit)?;

            // Some exports fill the unused side with 0.00
            match (debit, credit) {
                (Some(d), _) if d != 0.0 => Ok(-d.abs()),
                (_, Some(c)) if c != 0.0 => Ok(c.abs()),
                (Some(_), _) | (_, Some(_)) => Ok(0.0),
                (None, None) => Err("missing amount".into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::DateOrder;
    use crate::models::AmountSign;
    use chrono::NaiveDate;

    fn grid(lines: &[&[&str]]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_split_debit_credit_columns() {
        let rows = grid(&[
            &["Date", "Details", "Paid out", "Paid in", "Balance"],
            &["15 Jan 2024", "TESCO STORES", "23.10", "", "976.90"],
            &["16 Jan 2024", "SALARY", "", "2,000.00", "2,976.90"],
            &["17 Jan 2024", "ZERO FILLED", "0.00", "5.00", "2,981.90"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();

        let amounts: Vec<f64> = parsed.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![-23.1, 2000.0, 5.0]);
        assert_eq!(parsed.transactions[1].balance, Some(2976.9));
    }

    #[test]
    fn test_inverted_sign() {
        let rows = grid(&[
            &["Date", "Description", "Amount"],
            &["01/15/2024", "AMAZON.COM", "99.99"],
            &["01/16/2024", "PAYMENT THANK YOU", "-500.00"],
        ]);
        let opts = ParseOptions {
            amount_sign: AmountSign::Inverted,
            ..Default::default()
        };
        let parsed = parse_rows(rows, StatementFormat::Csv, &opts).unwrap();
        assert_eq!(parsed.transactions[0].amount, -99.99);
        assert_eq!(parsed.transactions[1].amount, 500.0);
    }

    #[test]
    fn test_skipped_rows_are_recorded() {
        let rows = grid(&[
            &["Date", "Description", "Amount"],
            &["01/15/2024", "COFFEE", "-3.50"],
            &["", "", ""],
            &["not a date", "JUNK", "-1.00"],
            &["01/17/2024", "NO AMOUNT", ""],
            &["01/18/2024", "", "-2.00"],
            &["Total", "", "-6.50"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();

        assert_eq!(parsed.transactions.len(), 1);
        let reasons: Vec<(usize, &str)> = parsed
            .skipped
            .iter()
            .map(|s| (s.row, s.reason.as_str()))
            .collect();
        assert_eq!(
            reasons,
            vec![
                (4, "unparseable date 'not a date'"),
                (5, "missing amount"),
                (6, "missing description"),
                (7, "unparseable date 'Total'"),
            ]
        );
    }

    #[test]
    fn test_memo_fallback_and_original_data() {
        let rows = grid(&[
            &["Date", "Description", "Memo", "Amount"],
            &["2024-02-01", "  ", "STANDING ORDER RENT", "-900"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();
        let tx = &parsed.transactions[0];
        assert_eq!(tx.description, "STANDING ORDER RENT");

        let original: serde_json::Value =
            serde_json::from_str(tx.original_data.as_deref().unwrap()).unwrap();
        assert_eq!(original["Memo"], "STANDING ORDER RENT");
        assert_eq!(original["Amount"], "-900");
    }

    #[test]
    fn test_identical_rows_get_distinct_hashes() {
        let rows = grid(&[
            &["Date", "Description", "Amount"],
            &["2024-03-01", "BUS FARE", "-2.40"],
            &["2024-03-01", "BUS FARE", "-2.40"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.transactions.len(), 2);
        assert_ne!(
            parsed.transactions[0].import_hash,
            parsed.transactions[1].import_hash
        );
    }

    #[test]
    fn test_configured_date_format_wins() {
        let rows = grid(&[
            &["Date", "Description", "Amount"],
            &["02/03/2024", "A", "-1"],
            &["04/05/2024", "B", "-1"],
        ]);
        let opts = ParseOptions {
            date_format: Some("%d/%m/%Y".into()),
            ambiguous_dates: DateOrder::MonthFirst,
            ..Default::default()
        };
        let parsed = parse_rows(rows, StatementFormat::Csv, &opts).unwrap();
        assert_eq!(
            parsed.transactions[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_headerless_grid() {
        let rows = grid(&[
            &["15/01/2024", "TESCO STORES 1234", "-23.10"],
            &["16/01/2024", "SALARY ACME LTD", "2000.00"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.transactions[0].description, "TESCO STORES 1234");
        assert_eq!(
            parsed.transactions[0].date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
    }

    #[test]
    fn test_header_without_amount_column_fails_instead_of_guessing() {
        let rows = grid(&[
            &["Date", "Description", "Whatever"],
            &["15/01/2024", "TESCO STORES 1234", "-23.10"],
            &["16/01/2024", "SALARY ACME LTD", "2000.00"],
        ]);
        let err = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains("Date, Description"), "{}", err);
    }

    #[test]
    fn test_headerless_grid_with_keyword_descriptions() {
        let rows = grid(&[
            &["15/01/2024", "DIRECT DEBIT NETFLIX", "-10.99"],
            &["16/01/2024", "TRANSFER CREDIT SAVINGS", "200.00"],
        ]);
        let parsed = parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).unwrap();
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.transactions[1].amount, 200.0);
    }

    #[test]
    fn test_no_header_and_no_data_shape_fails() {
        let rows = grid(&[&["hello", "world"], &["foo", "bar"]]);
        assert!(parse_rows(rows, StatementFormat::Csv, &ParseOptions::default()).is_err());
    }
}
