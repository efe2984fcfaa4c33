//! Amount parsing for bank exports
//!
//! Handles currency symbols and codes, thousands separators in either
//! convention, decimal commas, parentheses, leading/trailing minus signs,
//! and `CR`/`DR` suffixes.

use crate::error::{Error, Result};

/// Parse an amount string into a signed value
pub fn parse_amount(raw: &str) -> Result<f64> {
    let upper = raw.trim().to_uppercase();
    if upper.is_empty() {
        return Err(Error::Import("Empty amount".into()));
    }

    let mut body = upper.as_str();
    let mut negative = false;

    if let Some(stripped) = body.strip_suffix("CR") {
        body = stripped.trim_end();
    } else if let Some(stripped) = body.strip_suffix("DR") {
        body = stripped.trim_end();
        negative = true;
    }

    let body = strip_currency_code(body.trim());
    if body.starts_with('(') && body.ends_with(')') {
        negative = true;
    }
    // Dates, times and words are not amounts ("12/01/2024" is not 12012024)
    if body.chars().any(|c| c.is_alphabetic() || matches!(c, '/' | ':')) {
        return Err(Error::Import(format!("Unable to parse amount: {}", raw)));
    }

    let mut number = String::with_capacity(body.len());
    for c in body.chars() {
        match c {
            '0'..='9' | '.' | ',' => number.push(c),
            '-' | '\u{2212}' => negative = true,
            // Currency symbols, spaces (incl. NBSP) and apostrophes used as
            // thousands separators are all dropped
            _ => {}
        }
    }

    if !number.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::Import(format!("Unable to parse amount: {}", raw)));
    }

    let normalized = normalize_separators(&number);
    let value = normalized
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", raw)))?;

    Ok(if negative { -value.abs() } else { value })
}

/// Drop a currency code or abbreviation ("USD", "KR", "ZŁ") before or after
/// the number
fn strip_currency_code(body: &str) -> &str {
    let is_code = |word: &str| (1..=3).contains(&word.chars().count());

    let leading: usize = body
        .chars()
        .take_while(|c| c.is_alphabetic())
        .map(char::len_utf8)
        .sum();
    let body = if is_code(&body[..leading]) {
        body[leading..].trim_start()
    } else {
        body
    };

    let trailing: usize = body
        .chars()
        .rev()
        .take_while(|c| c.is_alphabetic())
        .map(char::len_utf8)
        .sum();
    let split = body.len() - trailing;
    if is_code(&body[split..]) {
        body[..split].trim_end()
    } else {
        body
    }
}

/// Whether a cell looks like an amount rather than text that happens to
/// contain digits ("TESCO 1234")
///
/// At most three letters are allowed, enough for an ISO code or a CR/DR
/// marker.
pub fn looks_like_amount(raw: &str) -> bool {
    let letters = raw.chars().filter(|c| c.is_alphabetic()).count();
    letters <= 3 && parse_amount(raw).is_ok()
}

/// Whether an amount string carries an explicit sign marker
pub fn has_explicit_sign(raw: &str) -> bool {
    let upper = raw.trim().to_uppercase();
    upper.contains('-')
        || upper.contains('\u{2212}')
        || upper.contains('+')
        || (upper.starts_with('(') && upper.ends_with(')'))
        || upper.ends_with("CR")
        || upper.ends_with("DR")
}

/// Rewrite a digits-and-separators string so that `.` is the decimal point
///
/// - both `.` and `,` present: the last one is the decimal separator
/// - only `,`: decimal when it occurs once with 1-2 trailing digits
/// - only `.`: thousands when it occurs more than once
fn normalize_separators(number: &str) -> String {
    let last_dot = number.rfind('.');
    let last_comma = number.rfind(',');

    match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            if c > d {
                number.replace('.', "").replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
        (None, Some(c)) => {
            let commas = number.matches(',').count();
            let decimals = number.len() - c - 1;
            if commas == 1 && (1..=2).contains(&decimals) {
                number.replace(',', ".")
            } else {
                number.replace(',', "")
            }
        }
        (Some(_), None) => {
            if number.matches('.').count() > 1 {
                number.replace('.', "")
            } else {
                number.to_string()
            }
        }
        (None, None) => number.to_string(),
    }
}
