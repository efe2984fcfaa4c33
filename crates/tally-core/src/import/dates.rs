//! Date parsing with day/month order inference
//!
//! Bank exports disagree on `01/02/2024`. The order is decided once per
//! column: any value whose first component exceeds 12 makes the column
//! day-first, any value whose second component exceeds 12 makes it
//! month-first. Columns that never disambiguate use the configured default.

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Day/month order for numeric dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// 01/02/2024 is January 2nd
    #[default]
    MonthFirst,
    /// 01/02/2024 is February 1st
    DayFirst,
}

impl DateOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MonthFirst => "month_first",
            Self::DayFirst => "day_first",
        }
    }
}

impl std::str::FromStr for DateOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "month_first" | "mdy" | "us" => Ok(Self::MonthFirst),
            "day_first" | "dmy" | "eu" => Ok(Self::DayFirst),
            _ => Err(format!(
                "Unknown date order: {} (valid: month_first, day_first)",
                s
            )),
        }
    }
}

impl std::fmt::Display for DateOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Numeric date: three groups separated by `/`, `-` or `.`, optionally
/// followed by a time part
fn numeric_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,4})[/.\-](\d{1,2})[/.\-](\d{2,4})(?:$|[\sT])")
            .expect("valid regex")
    })
}

/// Excel stores dates as days since 1899-12-30
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// Serial numbers accepted as dates (1954-10-03 ..= 2119-01-09)
const EXCEL_SERIAL_RANGE: std::ops::RangeInclusive<f64> = 20_000.0..=80_000.0;

/// Parses dates for one column
#[derive(Debug, Clone, Default)]
pub struct DateParser {
    format: Option<String>,
    order: DateOrder,
}

impl DateParser {
    /// Parser that tries an explicit chrono format before the generic forms
    pub fn with_format(format: Option<String>, order: DateOrder) -> Self {
        Self { format, order }
    }

    /// Parser whose order is inferred from the column's values
    pub fn infer<'a>(values: impl IntoIterator<Item = &'a str>, fallback: DateOrder) -> Self {
        let order = infer_date_order(values).unwrap_or(fallback);
        Self {
            format: None,
            order,
        }
    }

    pub fn order(&self) -> DateOrder {
        self.order
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Some(ref fmt) = self.format {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return Some(date);
            }
        }

        parse_numeric(s, self.order)
            .or_else(|| parse_textual(s))
            .or_else(|| parse_excel_serial(s))
    }
}

/// Infer the day/month order from a column of date strings
///
/// Returns None when no value disambiguates.
pub fn infer_date_order<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<DateOrder> {
    for value in values {
        let Some(caps) = numeric_date_re().captures(value.trim()) else {
            continue;
        };
        // Year-first dates carry no information about the order
        if caps[1].len() == 4 {
            continue;
        }
        let first: u32 = caps[1].parse().unwrap_or(0);
        let second: u32 = caps[2].parse().unwrap_or(0);
        if first > 12 && second <= 12 {
            return Some(DateOrder::DayFirst);
        }
        if second > 12 && first <= 12 {
            return Some(DateOrder::MonthFirst);
        }
    }
    None
}

fn parse_numeric(s: &str, order: DateOrder) -> Option<NaiveDate> {
    let caps = numeric_date_re().captures(s)?;
    let a: u32 = caps[1].parse().ok()?;
    let b: u32 = caps[2].parse().ok()?;
    let c = &caps[3];

    if caps[1].len() == 4 {
        let day: u32 = c.parse().ok()?;
        return NaiveDate::from_ymd_opt(a as i32, b, day);
    }

    let year = expand_year(c)?;
    let (month, day) = match order {
        DateOrder::MonthFirst => (a, b),
        DateOrder::DayFirst => (b, a),
    };
    NaiveDate::from_ymd_opt(year, month, day)
        // A single out-of-range value can still be read the other way round
        .or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

fn expand_year(s: &str) -> Option<i32> {
    let y: i32 = s.parse().ok()?;
    match s.len() {
        4 => Some(y),
        2 => Some(if y < 70 { 2000 + y } else { 1900 + y }),
        _ => None,
    }
}

/// Dates with a month name: "15 Jan 2024", "Jan 15, 2024", "15-ene-24",
/// "3. März 2024"
fn parse_textual(s: &str) -> Option<NaiveDate> {
    let tokens: Vec<&str> = s
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '/' | ',' | '.'))
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 3 {
        return None;
    }

    let mut month = None;
    let mut numbers = Vec::new();
    for token in tokens.iter().take(4) {
        if token.chars().all(|c| c.is_ascii_digit()) {
            numbers.push(*token);
        } else if month.is_none() {
            month = month_from_name(token);
        }
    }

    let month = month?;
    if numbers.len() < 2 {
        return None;
    }

    // Day is the 1-2 digit token, year the other one
    let (day, year) = if numbers[0].len() <= 2 && numbers[1].len() == 4 {
        (numbers[0], numbers[1])
    } else if numbers[0].len() == 4 {
        (numbers[1], numbers[0])
    } else {
        (numbers[0], numbers[1])
    };

    NaiveDate::from_ymd_opt(expand_year(year)?, month, day.parse().ok()?)
}

/// Month number from an English, Spanish, German or French month name
fn month_from_name(token: &str) -> Option<u32> {
    let lower = token.to_lowercase();
    let name = lower.trim_end_matches('.');
    if name.len() < 3 {
        return None;
    }

    const MONTHS: &[(&str, u32)] = &[
        ("jan", 1),
        ("ene", 1),
        ("jän", 1),
        ("janv", 1),
        ("feb", 2),
        ("fév", 2),
        ("fev", 2),
        ("mar", 3),
        ("mär", 3),
        ("apr", 4),
        ("abr", 4),
        ("avr", 4),
        ("may", 5),
        ("mai", 5),
        ("jun", 6),
        ("juin", 6),
        ("jul", 7),
        ("juil", 7),
        ("aug", 8),
        ("ago", 8),
        ("aoû", 8),
        ("aou", 8),
        ("sep", 9),
        ("set", 9),
        ("oct", 10),
        ("okt", 10),
        ("nov", 11),
        ("dec", 12),
        ("dic", 12),
        ("dez", 12),
        ("déc", 12),
    ];

    // Longest prefix wins so "juil" beats "jul" and "janv" beats "jan"
    MONTHS
        .iter()
        .filter(|(prefix, _)| name.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, month)| *month)
}

fn parse_excel_serial(s: &str) -> Option<NaiveDate> {
    let serial: f64 = s.parse().ok()?;
    excel_serial_to_date(serial)
}

/// Convert an Excel serial day number to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !EXCEL_SERIAL_RANGE.contains(&serial) {
        return None;
    }
    let (y, m, d) = EXCEL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Whether a string looks like a date token at all (any order)
pub fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    numeric_date_re().is_match(s) || parse_textual(s).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_iso_dates() {
        let parser = DateParser::default();
        assert_eq!(parser.parse("2024-01-15"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("2024-01-15 00:00:00"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("2024-01-15T10:30:00Z"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("2024/01/15"), Some(d(2024, 1, 15)));
    }

    #[test]
    fn test_infer_day_first() {
        let values = ["01/02/2024", "13/02/2024", "05/03/2024"];
        assert_eq!(infer_date_order(values), Some(DateOrder::DayFirst));

        let parser = DateParser::infer(values, DateOrder::MonthFirst);
        assert_eq!(parser.parse("01/02/2024"), Some(d(2024, 2, 1)));
    }

    #[test]
    fn test_infer_month_first() {
        let values = ["01/02/2024", "02/28/2024"];
        assert_eq!(infer_date_order(values), Some(DateOrder::MonthFirst));

        let parser = DateParser::infer(values, DateOrder::DayFirst);
        assert_eq!(parser.parse("01/02/2024"), Some(d(2024, 1, 2)));
    }

    #[test]
    fn test_ambiguous_column_uses_fallback() {
        let values = ["01/02/2024", "03/04/2024"];
        assert_eq!(infer_date_order(values), None);

        let parser = DateParser::infer(values, DateOrder::DayFirst);
        assert_eq!(parser.order(), DateOrder::DayFirst);
        assert_eq!(parser.parse("03/04/2024"), Some(d(2024, 4, 3)));

        let parser = DateParser::infer(values, DateOrder::MonthFirst);
        assert_eq!(parser.parse("03/04/2024"), Some(d(2024, 3, 4)));
    }

    #[test]
    fn test_dotted_and_two_digit_years() {
        let parser = DateParser::with_format(None, DateOrder::DayFirst);
        assert_eq!(parser.parse("15.01.2024"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("15-01-24"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("31/12/99"), Some(d(1999, 12, 31)));
    }

    #[test]
    fn test_textual_months() {
        let parser = DateParser::default();
        assert_eq!(parser.parse("15 Jan 2024"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("Jan 15, 2024"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("15-ene-24"), Some(d(2024, 1, 15)));
        assert_eq!(parser.parse("3. März 2024"), Some(d(2024, 3, 3)));
        assert_eq!(parser.parse("12 juil. 2024"), Some(d(2024, 7, 12)));
        assert_eq!(parser.parse("1 September 2023"), Some(d(2023, 9, 1)));
    }

    #[test]
    fn test_explicit_format_overrides() {
        let parser = DateParser::with_format(Some("%Y%m%d".into()), DateOrder::MonthFirst);
        assert_eq!(parser.parse("20240115"), Some(d(2024, 1, 15)));

        let parser = DateParser::with_format(Some("%d/%m/%Y".into()), DateOrder::MonthFirst);
        assert_eq!(parser.parse("02/03/2024"), Some(d(2024, 3, 2)));
    }

    #[test]
    fn test_excel_serial() {
        assert_eq!(excel_serial_to_date(45306.0), Some(d(2024, 1, 15)));
        assert_eq!(DateParser::default().parse("45306"), Some(d(2024, 1, 15)));
        assert_eq!(excel_serial_to_date(12.0), None);
    }

    #[test]
    fn test_not_dates() {
        let parser = DateParser::default();
        assert_eq!(parser.parse(""), None);
        assert_eq!(parser.parse("Total"), None);
        assert_eq!(parser.parse("Opening balance"), None);
        assert_eq!(parser.parse("-45.10"), None);
        assert!(!looks_like_date("Amount"));
        assert!(looks_like_date("01/15/2024"));
    }

    #[test]
    fn test_date_order_from_str() {
        assert_eq!("day_first".parse::<DateOrder>().unwrap(), DateOrder::DayFirst);
        assert_eq!("month-first".parse::<DateOrder>().unwrap(), DateOrder::MonthFirst);
        assert!("sideways".parse::<DateOrder>().is_err());
    }
}
