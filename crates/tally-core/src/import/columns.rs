//! Column-header heuristics
//!
//! Bank exports put their header row anywhere in the first few lines (after
//! account numbers, period banners, etc.) and name columns in the bank's own
//! language. We score candidate rows against a synonym table and build a
//! [`ColumnMap`] from the best one.

use serde::Serialize;

use super::amount::looks_like_amount;
use super::dates::looks_like_date;
use crate::error::{Error, Result};

/// How many leading rows are scanned for a header
pub const HEADER_SCAN_ROWS: usize = 25;

/// A semantic column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Date,
    Description,
    Memo,
    Amount,
    Debit,
    Credit,
    Balance,
    Reference,
}

/// Header synonyms, already normalized (lowercase, no accents)
///
/// The order of this table is also the containment-match priority: "debit
/// amount" must resolve to Debit before Amount gets a chance.
const SYNONYMS: &[(Field, &[&str])] = &[
    (
        Field::Balance,
        &[
            "balance",
            "running balance",
            "saldo",
            "kontostand",
            "solde",
        ],
    ),
    (
        Field::Debit,
        &[
            "debit",
            "debits",
            "withdrawal",
            "withdrawals",
            "paid out",
            "money out",
            "cargo",
            "cargos",
            "soll",
            "lastschrift",
        ],
    ),
    (
        Field::Credit,
        &[
            "credit",
            "credits",
            "deposit",
            "deposits",
            "paid in",
            "money in",
            "abono",
            "abonos",
            "haben",
            "gutschrift",
        ],
    ),
    (
        Field::Date,
        &[
            "date",
            "transaction date",
            "trans date",
            "posted date",
            "posting date",
            "post date",
            "booking date",
            "value date",
            "fecha",
            "fecha operacion",
            "fecha valor",
            "f valor",
            "datum",
            "buchungstag",
            "buchungsdatum",
            "wertstellung",
            "valuta",
            "date operation",
            "date de valeur",
        ],
    ),
    (
        Field::Reference,
        &[
            "reference",
            "ref",
            "reference number",
            "transaction id",
            "referencia",
            "referenz",
            "numero",
        ],
    ),
    (
        Field::Memo,
        &[
            "memo",
            "notes",
            "note",
            "additional info",
            "observaciones",
            "verwendungszweck",
            "complement",
        ],
    ),
    (
        Field::Description,
        &[
            "description",
            "details",
            "transaction details",
            "narrative",
            "payee",
            "merchant",
            "name",
            "concepto",
            "descripcion",
            "movimiento",
            "buchungstext",
            "beschreibung",
            "empfanger",
            "auftraggeber",
            "libelle",
            "libelle operation",
        ],
    ),
    (
        Field::Amount,
        &[
            "amount",
            "value",
            "transaction amount",
            "importe",
            "monto",
            "betrag",
            "umsatz",
            "montant",
        ],
    ),
];

/// Normalize a header cell: lowercase, strip accents and punctuation,
/// collapse whitespace
pub fn normalize_header(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            'ß' => 's',
            c if c.is_alphanumeric() => c,
            _ => ' ',
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify a header cell. The bool is true for an exact synonym match.
pub fn classify_header(raw: &str) -> Option<(Field, bool)> {
    let header = normalize_header(raw);
    if header.is_empty() {
        return None;
    }

    for (field, synonyms) in SYNONYMS {
        if synonyms.iter().any(|s| *s == header) {
            return Some((*field, true));
        }
    }

    let words: Vec<&str> = header.split(' ').collect();
    for (field, synonyms) in SYNONYMS {
        if synonyms.iter().any(|s| contains_words(&words, s)) {
            return Some((*field, false));
        }
    }

    None
}

/// Whether `phrase` appears as a run of whole words in `words`
fn contains_words(words: &[&str], phrase: &str) -> bool {
    let needle: Vec<&str> = phrase.split(' ').collect();
    words.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Where the signed amount comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountColumns {
    /// One signed column
    Single(usize),
    /// Separate outflow and inflow columns
    Split {
        debit: Option<usize>,
        credit: Option<usize>,
    },
}

/// Column indexes for the fields of a statement table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMap {
    pub date: usize,
    pub description: usize,
    pub memo: Option<usize>,
    pub amount: AmountColumns,
    pub balance: Option<usize>,
    pub reference: Option<usize>,
}

impl ColumnMap {
    /// Build a column map from a header row, or None when it lacks the
    /// required fields
    pub fn from_headers(headers: &[String]) -> Option<Self> {
        let classified: Vec<Option<(Field, bool)>> =
            headers.iter().map(|h| classify_header(h)).collect();

        // Exact matches beat containment; leftmost wins within each class
        let pick = |field: Field| -> Option<usize> {
            let exact = classified
                .iter()
                .position(|c| matches!(c, Some((f, true)) if *f == field));
            exact.or_else(|| {
                classified
                    .iter()
                    .position(|c| matches!(c, Some((f, false)) if *f == field))
            })
        };

        let date = pick(Field::Date)?;
        let memo = pick(Field::Memo);
        let description = pick(Field::Description).or(memo)?;
        let memo = memo.filter(|m| *m != description);

        let amount = match pick(Field::Amount) {
            Some(i) => AmountColumns::Single(i),
            None => {
                let debit = pick(Field::Debit);
                let credit = pick(Field::Credit);
                if debit.is_none() && credit.is_none() {
                    return None;
                }
                AmountColumns::Split { debit, credit }
            }
        };

        Some(Self {
            date,
            description,
            memo,
            amount,
            balance: pick(Field::Balance),
            reference: pick(Field::Reference),
        })
    }

    /// Highest column index referenced by this map
    pub fn max_index(&self) -> usize {
        let amount_max = match self.amount {
            AmountColumns::Single(i) => i,
            AmountColumns::Split { debit, credit } => {
                debit.unwrap_or(0).max(credit.unwrap_or(0))
            }
        };
        [
            Some(self.date),
            Some(self.description),
            self.memo,
            Some(amount_max),
            self.balance,
            self.reference,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }
}

/// A located header row
#[derive(Debug, Clone)]
pub struct HeaderMatch {
    /// Index of the header row in the grid
    pub row: usize,
    pub headers: Vec<String>,
    pub columns: ColumnMap,
}

/// Find the header row in the first [`HEADER_SCAN_ROWS`] rows
///
/// Among the qualifying rows the one recognizing the most distinct fields
/// wins; ties go to the earliest row.
pub fn locate_header(rows: &[Vec<String>]) -> Result<HeaderMatch> {
    let mut best: Option<(usize, usize, ColumnMap)> = None;
    let mut best_partial: Vec<String> = Vec::new();

    for (idx, row) in rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let mut distinct: Vec<Field> = row
            .iter()
            .filter_map(|cell| classify_header(cell).map(|(f, _)| f))
            .collect();
        distinct.sort_by_key(|f| *f as u8);
        distinct.dedup();

        if distinct.len() > best_partial.len() {
            best_partial = row
                .iter()
                .filter(|cell| classify_header(cell).is_some())
                .cloned()
                .collect();
        }

        if let Some(columns) = ColumnMap::from_headers(row) {
            let score = distinct.len();
            if best.as_ref().map_or(true, |(_, s, _)| score > *s) {
                best = Some((idx, score, columns));
            }
        }
    }

    match best {
        Some((row, _, columns)) => Ok(HeaderMatch {
            row,
            headers: rows[row].clone(),
            columns,
        }),
        None => {
            let found = if best_partial.is_empty() {
                "none".to_string()
            } else {
                best_partial.join(", ")
            };
            Err(Error::Import(format!(
                "Could not find a header row with date, description and amount columns (recognized: {})",
                found
            )))
        }
    }
}

/// Whether any scanned row reads like a (partial) header: two or more
/// recognized fields and no cell that looks like a date or an amount
///
/// Such files have a header the synonym table cannot complete, so guessing
/// columns from the data would silently misread them.
pub fn has_header_candidate(rows: &[Vec<String>]) -> bool {
    rows.iter().take(HEADER_SCAN_ROWS).any(|row| {
        let mut fields: Vec<Field> = row
            .iter()
            .filter_map(|cell| classify_header(cell).map(|(f, _)| f))
            .collect();
        fields.sort_by_key(|f| *f as u8);
        fields.dedup();
        fields.len() >= 2
            && !row
                .iter()
                .any(|cell| looks_like_date(cell) || looks_like_amount(cell))
    })
}

/// Infer a column map from data when the file has no header row
///
/// Looks at up to the first 20 non-empty rows. A column is a date column
/// when at least 80% of its cells look like dates, an amount column when
/// at least 80% parse as amounts. The widest remaining text column is the
/// description. A second amount column is taken as the running balance.
pub fn infer_columns(rows: &[Vec<String>]) -> Option<ColumnMap> {
    let sample: Vec<&Vec<String>> = rows
        .iter()
        .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
        .take(20)
        .collect();
    if sample.is_empty() {
        return None;
    }

    let width = sample.iter().map(|r| r.len()).max().unwrap_or(0);
    let ratio = |col: usize, test: &dyn Fn(&str) -> bool| -> f64 {
        let hits = sample
            .iter()
            .filter(|r| r.get(col).is_some_and(|c| test(c.as_str())))
            .count();
        hits as f64 / sample.len() as f64
    };

    let mut date = None;
    let mut amounts = Vec::new();
    let mut text_cols = Vec::new();
    for col in 0..width {
        if ratio(col, &|c| looks_like_date(c)) >= 0.8 {
            if date.is_none() {
                date = Some(col);
            }
        } else if ratio(col, &|c| looks_like_amount(c)) >= 0.8 {
            amounts.push(col);
        } else {
            text_cols.push(col);
        }
    }

    let date = date?;
    let amount = *amounts.first()?;
    let description = text_cols.into_iter().max_by_key(|col| {
        sample
            .iter()
            .map(|r| r.get(*col).map_or(0, |c| c.trim().len()))
            .sum::<usize>()
    })?;

    Some(ColumnMap {
        date,
        description,
        memo: None,
        amount: AmountColumns::Single(amount),
        balance: amounts.get(1).copied(),
        reference: None,
    })
}
