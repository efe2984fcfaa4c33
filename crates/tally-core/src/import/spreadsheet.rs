//! Excel/ODS reader

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::io::Cursor;
use tracing::debug;

use crate::error::{Error, Result};

/// Read the first non-empty worksheet into a grid of strings
///
/// Date cells become ISO `YYYY-MM-DD`, numbers plain decimal strings.
pub(super) fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    for name in workbook.sheet_names().to_vec() {
        let range = workbook.worksheet_range(&name)?;
        if range.is_empty() {
            continue;
        }
        debug!(sheet = %name, rows = range.height(), "Reading worksheet");
        return Ok(range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect());
    }

    Err(Error::Excel("Workbook has no non-empty worksheet".into()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::DurationIso(s) => s.clone(),
    }
}

fn format_number(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}
