//! Bank and currency command implementations

use anyhow::{Context, Result};
use tally_core::db::Database;
use tally_core::models::{AmountSign, NewBank};

use super::truncate;

pub fn cmd_banks_list(db: &Database, user_id: &str) -> Result<()> {
    let banks = db.list_banks(user_id)?;

    if banks.is_empty() {
        println!("No banks yet. Add one with: tally banks add \"Everyday Checking\"");
        return Ok(());
    }

    println!(
        "{:>5}  {:<30}  {:<8}  {:<10}  {:<8}",
        "ID", "Name", "Currency", "Dates", "Sign"
    );
    println!("{}", "-".repeat(70));
    for bank in &banks {
        println!(
            "{:>5}  {:<30}  {:<8}  {:<10}  {:<8}",
            bank.id,
            truncate(&bank.name, 30),
            bank.currency,
            bank.date_format.as_deref().unwrap_or("auto"),
            bank.amount_sign.as_str(),
        );
    }

    Ok(())
}

pub fn cmd_banks_add(
    db: &Database,
    user_id: &str,
    name: &str,
    currency: Option<&str>,
    date_format: Option<&str>,
    amount_sign: &str,
) -> Result<()> {
    let amount_sign: AmountSign = amount_sign.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let currency = match currency {
        Some(c) => c.to_string(),
        None => {
            db.get_user(user_id)?
                .context("User profile not found")?
                .default_currency
        }
    };

    let bank = db.create_bank(
        user_id,
        &NewBank {
            name: name.to_string(),
            currency,
            date_format: date_format.map(String::from),
            amount_sign,
        },
    )?;

    println!("✅ Created bank #{}: {} ({})", bank.id, bank.name, bank.currency);
    Ok(())
}

pub fn cmd_banks_delete(db: &Database, user_id: &str, id: i64, force: bool) -> Result<()> {
    let removed = db.delete_bank(user_id, id, force)?;
    if removed > 0 {
        println!("✅ Deleted bank #{} and {} transaction(s)", id, removed);
    } else {
        println!("✅ Deleted bank #{}", id);
    }
    Ok(())
}

pub fn cmd_currencies_list(db: &Database) -> Result<()> {
    let currencies = db.list_currencies()?;

    println!("{:<5}  {:<6}  {}", "Code", "Symbol", "Name");
    println!("{}", "-".repeat(40));
    for currency in &currencies {
        println!(
            "{:<5}  {:<6}  {}",
            currency.code,
            currency.symbol.as_deref().unwrap_or(""),
            currency.name
        );
    }

    Ok(())
}

pub fn cmd_currencies_add(
    db: &Database,
    code: &str,
    name: &str,
    symbol: Option<&str>,
) -> Result<()> {
    let currency = db.create_currency(code, name, symbol)?;
    println!("✅ Added currency {} ({})", currency.code, currency.name);
    Ok(())
}

pub fn cmd_currencies_delete(db: &Database, code: &str) -> Result<()> {
    db.delete_currency(code)?;
    println!("✅ Deleted currency {}", code.trim().to_uppercase());
    Ok(())
}
