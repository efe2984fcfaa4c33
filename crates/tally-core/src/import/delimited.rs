//! Delimited text (CSV/TSV/semicolon) reader with delimiter sniffing

use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;

const CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];
const SNIFF_LINES: usize = 20;

/// Read delimited text into a grid of trimmed cells
pub(super) fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let text = decode(bytes);
    let delimiter = sniff_delimiter(&text);
    debug!(delimiter = %(delimiter as char).escape_default(), "Sniffed delimiter");

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Decode as UTF-8 (BOM stripped), falling back to Latin-1 for legacy
/// exports
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Pick the delimiter that splits the leading lines most consistently
///
/// Each candidate is scored by how many of the first lines share its most
/// common multi-column field count, then by that field count. Ties keep
/// the earlier candidate, so plain commas win when nothing else does better.
pub fn sniff_delimiter(text: &str) -> u8 {
    let sample: String = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best = (b',', 0usize, 0usize);
    for candidate in CANDIDATES {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(candidate)
            .from_reader(sample.as_bytes());

        let mut counts: HashMap<usize, usize> = HashMap::new();
        for record in rdr.records().flatten() {
            *counts.entry(record.len()).or_insert(0) += 1;
        }

        let Some((fields, lines)) = counts
            .into_iter()
            .filter(|(fields, _)| *fields > 1)
            .max_by_key(|(fields, lines)| (*lines, *fields))
        else {
            continue;
        };

        if (lines, fields) > (best.2, best.1) {
            best = (candidate, fields, lines);
        }
    }

    best.0
}
