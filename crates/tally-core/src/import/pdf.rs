//! PDF statement parser
//!
//! PDF statements have no columns, only positioned text. After extraction
//! each line is classified:
//!
//! - a leading date token and one or two trailing amounts: a transaction
//!   (with two amounts the last one is the running balance)
//! - no date right after a transaction: continuation of its description,
//!   even when it ends in a number (foreign-currency amounts, references)
//! - page furniture (headers, page numbers, carried-forward lines): ignored

use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use tracing::debug;

use super::amount::{has_explicit_sign, parse_amount};
use super::dates::DateParser;
use super::{normalize_whitespace, HashTracker, ParseOptions, ParsedStatement, SkippedRow};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, StatementFormat};

const DATE_TOKEN: &str = r"\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4}|\d{4}-\d{2}-\d{2}|\d{1,2}[ \-][A-Za-zÀ-ÿ]{3,9}\.?[ \-]\d{2,4}|[A-Za-zÀ-ÿ]{3,9}\.? \d{1,2},? \d{4}";
const AMOUNT_TOKEN: &str =
    r"\(?[-+\x{2212}]?[€$£]?(?:\d{1,3}(?:[.,']\d{3})+|\d+)[.,]\d{2}\)?-?(?:\s?(?:CR|DR|Cr|Dr))?";

fn date_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^\s*({})\s+(.+)$", DATE_TOKEN)).expect("valid regex")
    })
}

fn leading_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!(r"^({})\s+", DATE_TOKEN)).expect("valid regex"))
}

fn amounts_tail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^(.*?)\s+({a})(?:\s+({a}))?\s*$",
            a = AMOUNT_TOKEN
        ))
        .expect("valid regex")
    })
}

fn bare_amounts_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^\s*({a})(?:\s+({a}))?\s*$", a = AMOUNT_TOKEN)).expect("valid regex")
    })
}

/// Lines that mark an opening balance
const OPENING_MARKERS: &[&str] = &[
    "opening balance",
    "balance brought forward",
    "brought forward",
    "previous balance",
    "saldo anterior",
    "saldo inicial",
    "alter kontostand",
    "solde précédent",
];

/// Page furniture that never belongs to a description
const FURNITURE_MARKERS: &[&str] = &[
    "carried forward",
    "closing balance",
    "statement period",
    "saldo final",
    "neuer kontostand",
    "nouveau solde",
];

/// Furniture recognized only at the start of a line ("TOTAL GAS" is a merchant)
const FURNITURE_PREFIXES: &[&str] = &["page ", "total", "subtotal", "continued"];

/// Parse a PDF statement
pub(super) fn parse(bytes: &[u8], opts: &ParseOptions) -> Result<ParsedStatement> {
    // pdf-extract panics on some malformed documents
    let extracted = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| Error::Pdf("Unreadable PDF document".into()))?;
    let text = extracted.map_err(|e| Error::Pdf(e.to_string()))?;
    if text.trim().is_empty() {
        return Err(Error::Pdf(
            "No text found in PDF (scanned statements are not supported)".into(),
        ));
    }
    Ok(parse_pdf_text(&text, opts))
}

/// A transaction line before dates and signs are resolved
#[derive(Debug)]
struct RawLine {
    line: usize,
    date: String,
    description: String,
    amount: String,
    balance: Option<String>,
    text: String,
}

/// Parse the extracted text of a PDF statement
pub fn parse_pdf_text(text: &str, opts: &ParseOptions) -> ParsedStatement {
    let mut raws: Vec<RawLine> = Vec::new();
    let mut opening_balance: Option<f64> = None;
    let mut continuing = false;

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();

        if OPENING_MARKERS.iter().any(|m| lower.contains(m)) {
            if raws.is_empty() {
                opening_balance = last_amount(trimmed);
            }
            continuing = false;
            continue;
        }
        if is_furniture(&lower) {
            continuing = false;
            continue;
        }

        if let Some(caps) = date_line_re()
            .captures(trimmed)
            .filter(|caps| is_date_token(&caps[1]))
        {
            let rest = caps[2].trim();
            if let Some(tail) = amounts_tail_re().captures(rest) {
                let (amount, balance) = split_amounts(&tail);
                raws.push(RawLine {
                    line: idx + 1,
                    date: caps[1].to_string(),
                    description: strip_leading_date(tail[1].trim()),
                    amount,
                    balance,
                    text: trimmed.to_string(),
                });
                continuing = true;
            } else {
                // Date banner without amounts (e.g., a day heading)
                continuing = false;
            }
            continue;
        }

        if !continuing {
            continue;
        }

        // A lone running balance or subtotal ends the description
        if bare_amounts_re().is_match(trimmed) {
            continuing = false;
        } else if let Some(last) = raws.last_mut() {
            last.description.push(' ');
            last.description.push_str(trimmed);
        }
    }

    let date_parser = opts.date_parser(raws.iter().map(|r| r.date.as_str()));
    debug!(
        lines = raws.len(),
        order = %date_parser.order(),
        opening_balance = ?opening_balance,
        "Classified PDF statement lines"
    );

    let mut transactions = Vec::new();
    let mut skipped = Vec::new();
    let mut hashes = HashTracker::default();
    let mut previous_balance = opening_balance;

    for raw in raws {
        let Some(date) = date_parser.parse(&raw.date) else {
            skipped.push(SkippedRow {
                row: raw.line,
                reason: format!("unparseable date '{}'", raw.date),
            });
            continue;
        };

        let parsed = match parse_amount(&raw.amount) {
            Ok(amount) => amount,
            Err(_) => {
                skipped.push(SkippedRow {
                    row: raw.line,
                    reason: format!("unparseable amount '{}'", raw.amount),
                });
                continue;
            }
        };

        let description = normalize_whitespace(&raw.description);
        if description.is_empty() {
            skipped.push(SkippedRow {
                row: raw.line,
                reason: "missing description".into(),
            });
            continue;
        }

        let balance = raw.balance.as_deref().and_then(|b| parse_amount(b).ok());
        let amount = match (has_explicit_sign(&raw.amount), balance, previous_balance) {
            (false, Some(current), Some(previous))
                if ((current - previous).abs() - parsed.abs()).abs() < 0.005 =>
            {
                if current < previous {
                    -parsed.abs()
                } else {
                    parsed.abs()
                }
            }
            _ => opts.amount_sign.apply(parsed),
        };
        if balance.is_some() {
            previous_balance = balance;
        }

        let import_hash = hashes.next(date, &description, amount);
        transactions.push(NewTransaction {
            date,
            description,
            amount,
            balance,
            reference: None,
            import_hash,
            original_data: Some(json!({ "line": raw.text }).to_string()),
        });
    }

    ParsedStatement {
        format: StatementFormat::Pdf,
        transactions,
        skipped,
    }
}

/// Month-name tokens must name a month ("Jan 15, 2024", not "ROOM 12 2024")
fn is_date_token(token: &str) -> bool {
    !token.starts_with(|c: char| c.is_alphabetic()) || DateParser::default().parse(token).is_some()
}

fn is_furniture(lower: &str) -> bool {
    if FURNITURE_MARKERS.iter().any(|m| lower.contains(m))
        || FURNITURE_PREFIXES.iter().any(|p| lower.starts_with(p))
    {
        return true;
    }
    // Column header repeated on every page
    !lower.chars().any(|c| c.is_ascii_digit())
        && lower.contains("date")
        && ["description", "details", "amount", "balance"]
            .iter()
            .any(|h| lower.contains(h))
}

/// (amount, balance) from a tail match
fn split_amounts(tail: &regex::Captures<'_>) -> (String, Option<String>) {
    match tail.get(3) {
        Some(balance) => (tail[2].to_string(), Some(balance.as_str().to_string())),
        None => (tail[2].to_string(), None),
    }
}

/// Drop a value date printed right after the booking date
fn strip_leading_date(description: &str) -> String {
    match leading_date_re().captures(description) {
        Some(caps) if is_date_token(&caps[1]) => description[caps[0].len()..].to_string(),
        _ => description.to_string(),
    }
}

fn last_amount(line: &str) -> Option<f64> {
    let caps = amounts_tail_re()
        .captures(line)
        .or_else(|| bare_amounts_re().captures(line))?;
    let last = caps.get(3).or_else(|| caps.get(2)).or_else(|| caps.get(1))?;
    parse_amount(last.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AmountSign;
    use chrono::NaiveDate;

    const STATEMENT: &str = "
        ACME BANK PLC                     Statement period 01/01/2024 - 31/01/2024
        Date        Description                      Amount       Balance
        Balance brought forward                                    1,000.00
        02/01/2024  TESCO STORES 2231                 23.10        976.90
                    LONDON GB
        03/01/2024  SALARY ACME LTD                2,000.00      2,976.90
        03/01/2024  PRET A MANGER                      4.50      2,972.40
        15/01/2024  14/01/2024 NETFLIX.COM            10.99      2,961.41

        Page 1 of 2
        Date        Description                      Amount       Balance
        20/01/2024  REFUND AMAZON                     (5.00)     2,956.41
        Total                                                    2,956.41
    ";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_statement_text() {
        let parsed = parse_pdf_text(STATEMENT, &ParseOptions::default());
        let txs = &parsed.transactions;
        assert_eq!(txs.len(), 5, "{:?}", txs);

        assert_eq!(txs[0].date, d(2024, 1, 2));
        assert_eq!(txs[0].description, "TESCO STORES 2231 LONDON GB");
        assert_eq!(txs[0].amount, -23.10);
        assert_eq!(txs[0].balance, Some(976.90));

        assert_eq!(txs[1].description, "SALARY ACME LTD");
        assert_eq!(txs[1].amount, 2000.0);

        assert_eq!(txs[2].date, d(2024, 1, 3));
        assert_eq!(txs[2].description, "PRET A MANGER");
        assert_eq!(txs[2].amount, -4.50);

        // Value date after the booking date is dropped
        assert_eq!(txs[3].date, d(2024, 1, 15));
        assert_eq!(txs[3].description, "NETFLIX.COM");
        assert_eq!(txs[3].amount, -10.99);

        // Explicit parentheses are negative even though the balance says otherwise
        assert_eq!(txs[4].description, "REFUND AMAZON");
        assert_eq!(txs[4].amount, -5.0);
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_unsigned_amounts_without_balance_use_sign_convention() {
        let text = "
            01/15/2024 AMAZON.COM 99.99
            01/16/2024 UBER TRIP 12.00
        ";
        let opts = ParseOptions {
            amount_sign: AmountSign::Inverted,
            ..Default::default()
        };
        let parsed = parse_pdf_text(text, &opts);
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.transactions[0].amount, -99.99);
        assert_eq!(parsed.transactions[0].date, d(2024, 1, 15));
        assert_eq!(parsed.transactions[1].balance, None);
    }

    #[test]
    fn test_textual_dates_and_cr_dr_markers() {
        let text = "
            05 Mar 2024 CARD PAYMENT SHELL 45.00 DR
            06 Mar 2024 TRANSFER FROM SAVINGS 100.00 CR
        ";
        let parsed = parse_pdf_text(text, &ParseOptions::default());
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.transactions[0].amount, -45.0);
        assert_eq!(parsed.transactions[1].amount, 100.0);
        assert_eq!(parsed.transactions[1].date, d(2024, 3, 6));
    }

    #[test]
    fn test_original_line_is_kept() {
        let parsed = parse_pdf_text("2024-04-01 RENT -900.00\n", &ParseOptions::default());
        let original = parsed.transactions[0].original_data.as_deref().unwrap();
        assert!(original.contains("2024-04-01 RENT -900.00"));
    }

    #[test]
    fn test_dateless_line_with_amount_continues_description() {
        let text = "
            02/01/2024 HOTEL PARIS 92.40
            EUR 85.00
            03/01/2024 COFFEE 3.10
        ";
        let parsed = parse_pdf_text(text, &ParseOptions::default());
        let txs = &parsed.transactions;
        assert_eq!(txs.len(), 2, "{:?}", txs);
        assert_eq!(txs[0].description, "HOTEL PARIS EUR 85.00");
        assert_eq!(txs[0].amount, 92.40);
        assert_eq!(txs[1].description, "COFFEE");
    }

    #[test]
    fn test_month_name_first_dates() {
        let text = "
            Jan 15, 2024 AMAZON MKTP 12.34
            Jan 16, 2024 UBER TRIP 8.00
            ROOM 12 2024 LATE CHECKOUT
        ";
        let parsed = parse_pdf_text(text, &ParseOptions::default());
        let txs = &parsed.transactions;
        assert_eq!(txs.len(), 2, "{:?}", txs);
        assert_eq!(txs[0].date, d(2024, 1, 15));
        assert_eq!(txs[0].description, "AMAZON MKTP");
        assert_eq!(txs[1].date, d(2024, 1, 16));
        assert_eq!(txs[1].description, "UBER TRIP ROOM 12 2024 LATE CHECKOUT");
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_plus_signed_credit() {
        let text = "
            01/03/2024 REFUND SHOP +100.00
            02/03/2024 GROCERIES -20.00
        ";
        let parsed = parse_pdf_text(text, &ParseOptions::default());
        assert_eq!(parsed.transactions.len(), 2);
        assert_eq!(parsed.transactions[0].amount, 100.0);
        assert_eq!(parsed.transactions[0].description, "REFUND SHOP");
        assert_eq!(parsed.transactions[1].amount, -20.0);
    }

    #[test]
    fn test_garbage_pdf_is_an_error() {
        let err = parse(b"%PDF-1.4 not really a pdf", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Pdf(_)));
    }

    #[test]
    fn test_no_transactions() {
        let parsed = parse_pdf_text("Nothing to see here\nPage 1 of 1\n", &ParseOptions::default());
        assert!(parsed.transactions.is_empty());
    }
}
