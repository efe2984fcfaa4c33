//! Statement import
//!
//! Turns bank exports (CSV, Excel, PDF) into [`NewTransaction`]s. Nothing in
//! here knows about a specific bank: column layout, delimiter, date order and
//! amount conventions are all detected from the file, with the bank's
//! configured `date_format` and `amount_sign` as overrides.

mod amount;
mod columns;
mod dates;
mod delimited;
mod pdf;
mod spreadsheet;
mod tabular;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;
use crate::models::{AmountSign, Bank, NewTransaction, StatementFormat};

pub use amount::{has_explicit_sign, looks_like_amount, parse_amount};
pub use columns::{
    classify_header, infer_columns, locate_header, normalize_header, AmountColumns, ColumnMap,
    Field, HeaderMatch, HEADER_SCAN_ROWS,
};
pub use dates::{excel_serial_to_date, infer_date_order, DateOrder, DateParser};
pub use delimited::sniff_delimiter;
pub use pdf::parse_pdf_text;

/// Per-import parsing options
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Explicit chrono format for the date column; inferred when None
    pub date_format: Option<String>,
    pub amount_sign: AmountSign,
    /// Day/month order for columns that never disambiguate
    pub ambiguous_dates: DateOrder,
}

impl ParseOptions {
    /// Options from a bank's configuration
    pub fn for_bank(bank: &Bank, ambiguous_dates: DateOrder) -> Self {
        Self {
            date_format: bank.date_format.clone(),
            amount_sign: bank.amount_sign,
            ambiguous_dates,
        }
    }

    /// Date parser for a column of raw date strings
    fn date_parser<'a>(&self, values: impl IntoIterator<Item = &'a str>) -> DateParser {
        match self.date_format {
            Some(ref fmt) => DateParser::with_format(Some(fmt.clone()), self.ambiguous_dates),
            None => DateParser::infer(values, self.ambiguous_dates),
        }
    }
}

/// A row the parser could not turn into a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based row (CSV/Excel) or line (PDF) number
    pub row: usize,
    pub reason: String,
}

/// Result of parsing one statement
#[derive(Debug, Clone)]
pub struct ParsedStatement {
    pub format: StatementFormat,
    pub transactions: Vec<NewTransaction>,
    pub skipped: Vec<SkippedRow>,
}

/// Detect a statement's format from its filename, falling back to magic bytes
pub fn detect_format(filename: Option<&str>, bytes: &[u8]) -> StatementFormat {
    if let Some(ext) = filename
        .map(Path::new)
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
    {
        if let Ok(format) = ext.parse::<StatementFormat>() {
            return format;
        }
    }

    if bytes.starts_with(b"%PDF") {
        StatementFormat::Pdf
    } else if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        StatementFormat::Excel
    } else {
        StatementFormat::Csv
    }
}

/// Parse statement bytes in a known format
pub fn parse_statement(
    bytes: &[u8],
    format: StatementFormat,
    opts: &ParseOptions,
) -> Result<ParsedStatement> {
    let parsed = match format {
        StatementFormat::Csv => {
            let rows = delimited::read_rows(bytes)?;
            tabular::parse_rows(rows, format, opts)?
        }
        StatementFormat::Excel => {
            let rows = spreadsheet::read_rows(bytes)?;
            tabular::parse_rows(rows, format, opts)?
        }
        StatementFormat::Pdf => pdf::parse(bytes, opts)?,
    };

    info!(
        format = %format,
        transactions = parsed.transactions.len(),
        skipped = parsed.skipped.len(),
        "Parsed statement"
    );
    for skip in &parsed.skipped {
        debug!(row = skip.row, reason = %skip.reason, "Skipped row");
    }

    Ok(parsed)
}

/// Trim and collapse internal whitespace
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Generate the deduplication hash for a transaction
///
/// `occurrence` is how many identical (date, description, amount) rows came
/// before this one in the same file.
pub fn generate_hash(date: &NaiveDate, description: &str, amount: f64, occurrence: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update(occurrence.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Hands out occurrence-aware hashes for one file
#[derive(Debug, Default)]
struct HashTracker {
    seen: HashMap<(NaiveDate, String, u64), u32>,
}

impl HashTracker {
    fn next(&mut self, date: NaiveDate, description: &str, amount: f64) -> String {
        let count = self
            .seen
            .entry((date, description.to_string(), amount.to_bits()))
            .or_insert(0);
        let hash = generate_hash(&date, description, amount, *count);
        *count += 1;
        hash
    }
}

/// Convert a row to a JSON object using headers as keys
fn row_to_json(headers: &[String], row: &[String]) -> String {
    let mut map = serde_json::Map::new();
    for (i, header) in headers.iter().enumerate() {
        if let Some(value) = row.get(i) {
            map.insert(header.clone(), Value::String(value.clone()));
        }
    }
    json!(map).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_format_by_extension() {
        assert_eq!(detect_format(Some("jan.csv"), b""), StatementFormat::Csv);
        assert_eq!(detect_format(Some("jan.TSV"), b""), StatementFormat::Csv);
        assert_eq!(detect_format(Some("jan.xlsx"), b""), StatementFormat::Excel);
        assert_eq!(detect_format(Some("jan.xls"), b""), StatementFormat::Excel);
        assert_eq!(detect_format(Some("jan.pdf"), b""), StatementFormat::Pdf);
    }

    #[test]
    fn test_detect_format_by_magic() {
        assert_eq!(detect_format(None, b"%PDF-1.7 ..."), StatementFormat::Pdf);
        assert_eq!(
            detect_format(Some("download"), b"PK\x03\x04rest"),
            StatementFormat::Excel
        );
        assert_eq!(
            detect_format(None, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1]),
            StatementFormat::Excel
        );
        assert_eq!(detect_format(Some("export.dat"), b"Date,Amount"), StatementFormat::Csv);
    }

    #[test]
    fn test_hash_occurrence_distinguishes_duplicates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let mut tracker = HashTracker::default();
        let first = tracker.next(date, "COFFEE", -3.5);
        let second = tracker.next(date, "COFFEE", -3.5);
        let other = tracker.next(date, "COFFEE", -4.0);

        assert_ne!(first, second);
        assert_ne!(first, other);
        assert_eq!(first, generate_hash(&date, "COFFEE", -3.5, 0));
        assert_eq!(second, generate_hash(&date, "COFFEE", -3.5, 1));
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  AMAZON   MKTP\tUS  "), "AMAZON MKTP US");
        assert_eq!(normalize_whitespace("   "), "");
    }

    #[test]
    fn test_parse_options_for_bank() {
        let bank = Bank {
            id: 1,
            user_id: "u1".into(),
            name: "Card".into(),
            currency: "USD".into(),
            date_format: Some("%d/%m/%Y".into()),
            amount_sign: AmountSign::Inverted,
            created_at: chrono::Utc::now(),
        };
        let opts = ParseOptions::for_bank(&bank, DateOrder::DayFirst);
        assert_eq!(opts.date_format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(opts.amount_sign, AmountSign::Inverted);
        assert_eq!(opts.ambiguous_dates, DateOrder::DayFirst);
    }

    #[test]
    fn test_parse_statement_csv_end_to_end() {
        let csv = "\u{feff}Fecha;Concepto;Importe;Saldo\n\
                   02/01/2024;MERCADONA   VALENCIA;-45,20;1.954,80\n\
                   15/01/2024;NOMINA ACME SL;2.000,00;3.954,80\n\
                   Total;;1.954,80;\n";
        let parsed =
            parse_statement(csv.as_bytes(), StatementFormat::Csv, &ParseOptions::default()).unwrap();

        assert_eq!(parsed.transactions.len(), 2);
        let first = &parsed.transactions[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.description, "MERCADONA VALENCIA");
        assert_eq!(first.amount, -45.2);
        assert_eq!(first.balance, Some(1954.8));
        assert_eq!(parsed.skipped.len(), 1);
        assert_eq!(parsed.skipped[0].row, 4);
    }
}
