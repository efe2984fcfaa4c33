//! Report command implementations

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use tally_core::db::{default_report_range, Database};
use tally_core::models::ReportFilter;

use super::{resolve_bank, truncate};
use crate::cli::ReportArgs;

fn parse_date_arg(value: &str, name: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid --{} date format (use YYYY-MM-DD)", name))
}

/// Turn report flags into a filter (default: the last 12 months)
pub fn resolve_report_filter(db: &Database, user_id: &str, args: &ReportArgs) -> Result<ReportFilter> {
    let (default_from, default_to) = default_report_range(Utc::now().date_naive());
    let from = match args.from.as_deref() {
        Some(s) => parse_date_arg(s, "from")?,
        None => default_from,
    };
    let to = match args.to.as_deref() {
        Some(s) => parse_date_arg(s, "to")?,
        None => default_to,
    };
    let bank_id = match args.bank.as_deref() {
        Some(name) => Some(resolve_bank(db, user_id, name)?.id),
        None => None,
    };

    Ok(db.report_filter(user_id, from, to, bank_id, args.currency.as_deref())?)
}

fn print_header(title: &str, filter: &ReportFilter) {
    println!();
    println!("📊 {} ({} to {}, {})", title, filter.from, filter.to, filter.currency);
    println!("   ─────────────────────────────────────────────────────────────");
}

pub fn cmd_report_pivot(db: &Database, filter: &ReportFilter, json: bool) -> Result<()> {
    let pivot = db.pivot_table(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pivot)?);
        return Ok(());
    }

    print_header("Category × Month", filter);
    if pivot.rows.is_empty() {
        println!("   No transactions in this period");
        return Ok(());
    }

    print!("   {:20}", "Category");
    for month in &pivot.months {
        print!(" {:>10}", month);
    }
    println!(" {:>11}", "Total");

    for row in &pivot.rows {
        print!("   {:20}", truncate(&row.category, 20));
        for cell in &row.cells {
            print!(" {:>10.2}", cell);
        }
        println!(" {:>11.2}", row.total);
    }

    print!("   {:20}", "Total");
    for total in &pivot.column_totals {
        print!(" {:>10.2}", total);
    }
    println!(" {:>11.2}", pivot.grand_total);

    Ok(())
}

pub fn cmd_report_by_category(db: &Database, filter: &ReportFilter, json: bool) -> Result<()> {
    let breakdown = db.spending_by_category(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    print_header("Spending by Category", filter);
    if breakdown.is_empty() {
        println!("   No spending in this period");
        return Ok(());
    }

    let total: f64 = breakdown.iter().map(|c| c.amount).sum();
    for c in &breakdown {
        let bar_len = (c.percentage / 5.0).round() as usize;
        println!(
            "   {:20} {:>12.2} {:>5.1}% {:>5} txns  {}",
            truncate(&c.category, 20),
            c.amount,
            c.percentage,
            c.transaction_count,
            "█".repeat(bar_len)
        );
    }
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:20} {:>12.2}", "Total", total);

    Ok(())
}

pub fn cmd_report_by_bank(db: &Database, filter: &ReportFilter, json: bool) -> Result<()> {
    let banks = db.breakdown_by_bank(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&banks)?);
        return Ok(());
    }

    print_header("By Bank", filter);
    if banks.is_empty() {
        println!("   No transactions in this period");
        return Ok(());
    }

    println!(
        "   {:24} {:>12} {:>12} {:>12} {:>6}",
        "Bank", "Income", "Expenses", "Net", "Txns"
    );
    for b in &banks {
        println!(
            "   {:24} {:>12.2} {:>12.2} {:>12.2} {:>6}",
            truncate(&b.bank, 24),
            b.income,
            b.expenses,
            b.net,
            b.transaction_count
        );
    }

    Ok(())
}

pub fn cmd_report_summary(db: &Database, filter: &ReportFilter, json: bool) -> Result<()> {
    let summary = db.summary(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    print_header("Summary", filter);
    println!("   Income:        {:>12.2}", summary.income);
    println!("   Expenses:      {:>12.2}", summary.expenses);
    println!("   Net:           {:>12.2}", summary.net);
    println!("   Savings rate:  {:>11.1}%", summary.savings_rate * 100.0);
    println!("   Transactions:  {:>12}", summary.transaction_count);
    if summary.uncategorized_count > 0 {
        println!(
            "   ⚠️  {} uncategorized. Try `tally categorize` or `tally suggest`",
            summary.uncategorized_count
        );
    }

    Ok(())
}
