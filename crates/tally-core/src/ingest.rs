//! Statement ingestion: parse, store, categorize
//!
//! Shared by the CLI `import` command and the server's upload handler.

use serde::Serialize;
use tracing::{info, warn};

use crate::categorize::{CategoryMatch, Categorizer};
use crate::db::{Database, ImportCounts};
use crate::error::Result;
use crate::import::{detect_format, parse_statement, DateOrder, ParseOptions, SkippedRow};
use crate::models::{Bank, ImportRecord};

/// Options for one ingestion run
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Run the keyword/rule cascade on newly inserted transactions
    pub categorize: bool,
    /// Day/month order for date columns that never disambiguate
    pub ambiguous_dates: DateOrder,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            categorize: true,
            ambiguous_dates: DateOrder::default(),
        }
    }
}

/// What an ingestion run did
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub import: ImportRecord,
    pub skipped: Vec<SkippedRow>,
}

/// Parse a statement and store its transactions under a bank
///
/// Duplicates (same user, bank and import hash) are counted and dropped.
/// The import record is written even when nothing new was inserted so the
/// skipped rows stay inspectable.
pub fn ingest_statement(
    db: &Database,
    user_id: &str,
    bank: &Bank,
    filename: Option<&str>,
    bytes: &[u8],
    opts: IngestOptions,
) -> Result<ImportOutcome> {
    let format = detect_format(filename, bytes);
    let parse_opts = ParseOptions::for_bank(bank, opts.ambiguous_dates);
    let parsed = parse_statement(bytes, format, &parse_opts)?;

    if parsed.transactions.is_empty() {
        warn!(
            user_id,
            bank_id = bank.id,
            skipped = parsed.skipped.len(),
            "Statement produced no transactions"
        );
    }

    let import_id = db.create_import(user_id, bank.id, filename, format)?;

    let categorizer = if opts.categorize {
        Some(Categorizer::for_user(db, user_id)?)
    } else {
        None
    };

    let mut counts = ImportCounts {
        rows_parsed: parsed.transactions.len() as i64,
        rows_skipped: parsed.skipped.len() as i64,
        ..Default::default()
    };
    let mut updates = Vec::new();

    for tx in &parsed.transactions {
        match db.insert_transaction(user_id, bank.id, Some(import_id), &bank.currency, tx)? {
            Some(id) => {
                counts.imported += 1;
                if let Some(CategoryMatch {
                    category_id,
                    source,
                    ..
                }) = categorizer.as_ref().and_then(|c| c.categorize(&tx.description))
                {
                    updates.push((id, Some(category_id), Some(source)));
                }
            }
            None => counts.duplicates += 1,
        }
    }

    counts.categorized = db.apply_category_updates(&updates)? as i64;
    db.finish_import(import_id, &counts, &parsed.skipped)?;
    db.log_audit(
        user_id,
        "import",
        Some("import"),
        Some(import_id),
        filename,
    )?;

    info!(
        user_id,
        bank_id = bank.id,
        import_id,
        imported = counts.imported,
        duplicates = counts.duplicates,
        categorized = counts.categorized,
        skipped = counts.rows_skipped,
        "Import complete"
    );

    let import = db
        .get_import(user_id, import_id)?
        .ok_or_else(|| crate::error::Error::NotFound(format!("Import {}", import_id)))?;

    Ok(ImportOutcome {
        import,
        skipped: parsed.skipped,
    })
}
