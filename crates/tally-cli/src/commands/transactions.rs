//! Transaction command implementations

use anyhow::Result;
use tally_core::db::{Database, TransactionFilter};

use super::{resolve_bank, resolve_category, truncate};

/// Filters for `tally transactions list`
#[derive(Debug, Clone)]
pub struct TransactionListArgs {
    pub limit: i64,
    pub bank: Option<String>,
    pub category: Option<String>,
    pub uncategorized: bool,
    pub search: Option<String>,
}

impl Default for TransactionListArgs {
    fn default() -> Self {
        Self {
            limit: 20,
            bank: None,
            category: None,
            uncategorized: false,
            search: None,
        }
    }
}

pub fn cmd_transactions_list(
    db: &Database,
    user_id: &str,
    args: &TransactionListArgs,
) -> Result<()> {
    let bank_id = match args.bank.as_deref() {
        Some(name) => Some(resolve_bank(db, user_id, name)?.id),
        None => None,
    };
    let category_id = match args.category.as_deref() {
        Some(name) => Some(resolve_category(db, user_id, name)?.id),
        None => None,
    };

    let filter = TransactionFilter::new(user_id)
        .bank_id(bank_id)
        .category_id(category_id)
        .uncategorized(args.uncategorized)
        .search(args.search.as_deref());
    let total = db.count_transactions(&filter)?;
    let transactions = db.list_transactions(&filter.limit(Some(args.limit.max(1))))?;

    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!(
        "{:>6}  {:10}  {:>12}  {:3}  {:<18}  {:<16}  {}",
        "ID", "Date", "Amount", "Cur", "Category", "Bank", "Description"
    );
    println!("{}", "-".repeat(110));
    for tx in &transactions {
        let category = match (&tx.category_name, tx.transaction.category_source) {
            (Some(name), Some(source)) => format!("{} ({})", name, source.as_str()),
            (Some(name), None) => name.clone(),
            (None, _) => "-".to_string(),
        };
        println!(
            "{:>6}  {:10}  {:>12.2}  {:3}  {:<18}  {:<16}  {}",
            tx.transaction.id,
            tx.transaction.date,
            tx.transaction.amount,
            tx.transaction.currency,
            truncate(&category, 18),
            truncate(&tx.bank_name, 16),
            truncate(&tx.transaction.description, 40)
        );
    }
    println!();
    println!("Showing {} of {} transaction(s)", transactions.len(), total);

    Ok(())
}

pub fn cmd_transactions_set_category(
    db: &Database,
    user_id: &str,
    id: i64,
    category_name: Option<&str>,
    remember: bool,
) -> Result<()> {
    let category = match category_name {
        Some(name) => Some(resolve_category(db, user_id, name)?),
        None => None,
    };

    db.set_transaction_category(user_id, id, category.as_ref().map(|c| c.id), remember)?;

    match category {
        Some(c) => {
            println!("✅ Transaction #{} -> {}", id, c.name);
            if remember {
                println!("   Remembered as a keyword for future imports");
            }
        }
        None => println!("✅ Cleared category of transaction #{}", id),
    }

    Ok(())
}
