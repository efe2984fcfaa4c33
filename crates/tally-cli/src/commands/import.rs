//! Import command implementations

use std::path::Path;

use anyhow::{Context, Result};
use tally_core::db::Database;
use tally_core::ingest::{ingest_statement, IngestOptions};
use tally_core::models::NewBank;
use tally_core::DateOrder;

use super::truncate;

/// Rows listed after an import before eliding the rest
const MAX_SKIPPED_SHOWN: usize = 10;

/// Import a statement file into a bank, creating the bank when asked
#[allow(clippy::too_many_arguments)]
pub fn cmd_import(
    db: &Database,
    user_id: &str,
    file: &Path,
    bank_name: &str,
    create: bool,
    currency: Option<&str>,
    date_order: Option<&str>,
    categorize: bool,
) -> Result<()> {
    println!("📥 Importing {}...", file.display());

    let bank = match db.find_bank_by_name(user_id, bank_name)? {
        Some(bank) => bank,
        None if create => {
            let currency = match currency {
                Some(c) => c.to_string(),
                None => {
                    db.get_user(user_id)?
                        .context("User profile not found")?
                        .default_currency
                }
            };
            let bank = db
                .create_bank(
                    user_id,
                    &NewBank {
                        name: bank_name.to_string(),
                        currency,
                        ..Default::default()
                    },
                )
                .context("Failed to create bank")?;
            println!("   Created bank: {} ({})", bank.name, bank.currency);
            bank
        }
        None => anyhow::bail!(
            "Bank '{}' not found. Use --create to add it, or see `tally banks`",
            bank_name
        ),
    };

    let ambiguous_dates = match date_order {
        Some(s) => s.parse::<DateOrder>().map_err(|e| anyhow::anyhow!(e))?,
        None => DateOrder::default(),
    };

    tracing::debug!(
        bank_id = bank.id,
        date_order = %ambiguous_dates,
        categorize,
        "Resolved import target"
    );

    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file.file_name().and_then(|n| n.to_str());

    let outcome = ingest_statement(
        db,
        user_id,
        &bank,
        filename,
        &bytes,
        IngestOptions {
            categorize,
            ambiguous_dates,
        },
    )
    .context("Import failed")?;

    let record = &outcome.import;
    println!("   Bank: {} ({})", bank.name, bank.currency);
    println!("   Format: {}", record.format);
    println!("   Rows parsed: {}", record.rows_parsed);
    println!("   Imported: {}", record.imported);
    if record.duplicates > 0 {
        println!("   Duplicates skipped: {}", record.duplicates);
    }
    if categorize {
        println!("   Categorized: {}", record.categorized);
    }

    if !outcome.skipped.is_empty() {
        println!("   ⚠️  {} row(s) skipped:", outcome.skipped.len());
        for row in &outcome.skipped {
            tracing::debug!(row = row.row, reason = %row.reason, "Skipped row");
        }
        for row in outcome.skipped.iter().take(MAX_SKIPPED_SHOWN) {
            println!("      row {}: {}", row.row, truncate(&row.reason, 60));
        }
        if outcome.skipped.len() > MAX_SKIPPED_SHOWN {
            println!(
                "      ... see `tally imports show {}` for the rest",
                record.id
            );
        }
    }

    println!("✅ Import #{} complete", record.id);
    Ok(())
}

pub fn cmd_imports_list(db: &Database, user_id: &str, limit: i64) -> Result<()> {
    let imports = db.list_imports(user_id, limit)?;

    if imports.is_empty() {
        println!("No imports yet. Try: tally import --file statement.csv --bank Checking --create");
        return Ok(());
    }

    let banks = db.list_banks(user_id)?;
    let bank_name = |id: i64| {
        banks
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.name.as_str())
            .unwrap_or("?")
    };

    println!(
        "{:>5}  {:<19}  {:<20}  {:<24}  {:<5}  {:>8}  {:>5}  {:>7}",
        "ID", "When", "Bank", "File", "Fmt", "Imported", "Dups", "Skipped"
    );
    println!("{}", "-".repeat(106));
    for import in &imports {
        println!(
            "{:>5}  {:<19}  {:<20}  {:<24}  {:<5}  {:>8}  {:>5}  {:>7}",
            import.id,
            import.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(bank_name(import.bank_id), 20),
            truncate(import.filename.as_deref().unwrap_or("-"), 24),
            import.format.as_str(),
            import.imported,
            import.duplicates,
            import.rows_skipped,
        );
    }

    Ok(())
}

pub fn cmd_imports_show(db: &Database, user_id: &str, id: i64) -> Result<()> {
    let details = db
        .get_import_details(user_id, id)?
        .with_context(|| format!("Import {} not found", id))?;
    let import = &details.import;

    println!("Import #{}", import.id);
    println!("   File: {}", import.filename.as_deref().unwrap_or("-"));
    println!("   Format: {}", import.format);
    println!("   When: {}", import.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("   Rows parsed: {}", import.rows_parsed);
    println!("   Imported: {}", import.imported);
    println!("   Duplicates: {}", import.duplicates);
    println!("   Categorized: {}", import.categorized);

    if details.skipped.is_empty() {
        println!("   No rows skipped");
    } else {
        println!("   Skipped rows:");
        for row in &details.skipped {
            println!("      row {}: {}", row.row, row.reason);
        }
    }

    Ok(())
}

pub fn cmd_imports_delete(db: &Database, user_id: &str, id: i64) -> Result<()> {
    let removed = db.delete_import(user_id, id)?;
    println!("✅ Deleted import #{} and {} transaction(s)", id, removed);
    Ok(())
}
