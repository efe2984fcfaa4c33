//! Integration tests for tally-core
//!
//! These tests exercise the full import → categorize → recategorize → report
//! workflow through the public API.

use chrono::NaiveDate;
use tally_core::{
    db::Database,
    ingest::{ingest_statement, IngestOptions},
    models::{Bank, CategorySource, NewBank},
    recategorize, RecategorizeScope, TransactionFilter,
};

/// Two months with activity and an empty month between them.
/// "ZZ QUANTUM WIDGETS" matches no default rule.
fn checking_csv() -> &'static str {
    "Date,Description,Amount,Balance\n\
     01/05/2024,WALMART SUPERCENTER #1234,-50.00,950.00\n\
     01/09/2024,NETFLIX.COM,-15.49,934.51\n\
     01/12/2024,ZZ Quantum Widgets,-6.75,927.76\n\
     01/31/2024,PAYROLL ACME INC,2000.00,2927.76\n\
     03/02/2024,WALMART SUPERCENTER #1234,-30.00,2897.76\n\
     03/15/2024,ZZ QUANTUM  WIDGETS,-5.00,2892.76\n"
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn setup() -> (Database, Bank) {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    db.seed_defaults().expect("Failed to seed defaults");
    db.ensure_user("alice", Some("alice@example.com"), "USD")
        .expect("Failed to create user");
    let bank = db
        .create_bank(
            "alice",
            &NewBank {
                name: "Everyday Checking".into(),
                currency: "USD".into(),
                ..Default::default()
            },
        )
        .expect("Failed to create bank");
    (db, bank)
}

fn import(db: &Database, bank: &Bank) -> i64 {
    let outcome = ingest_statement(
        db,
        "alice",
        bank,
        Some("checking.csv"),
        checking_csv().as_bytes(),
        IngestOptions::default(),
    )
    .expect("Import failed");
    assert_eq!(outcome.import.imported, 6);
    assert_eq!(outcome.import.categorized, 4);
    assert!(outcome.skipped.is_empty());
    outcome.import.id
}

// =============================================================================
// Import and Categorization
// =============================================================================

#[test]
fn test_full_workflow() {
    let (db, bank) = setup();
    import(&db, &bank);

    // Pivot: Feb is present even though empty, Uncategorized is last
    let filter = db
        .report_filter("alice", d(2024, 1, 1), d(2024, 3, 31), None, None)
        .unwrap();
    assert_eq!(filter.currency, "USD");
    let pivot = db.pivot_table(&filter).unwrap();
    assert_eq!(pivot.months, vec!["2024-01", "2024-02", "2024-03"]);
    let last = pivot.rows.last().unwrap();
    assert_eq!(last.category_id, None);
    assert_eq!(last.cells, vec![-6.75, 0.0, -5.0]);
    let groceries = pivot.rows.iter().find(|r| r.category == "Groceries").unwrap();
    assert_eq!(groceries.cells, vec![-50.0, 0.0, -30.0]);
    assert_eq!(groceries.total, -80.0);
    assert_eq!(pivot.column_totals[1], 0.0);

    // Teach a keyword, then recategorize everything
    let shopping = db.find_category_by_name("alice", "Shopping").unwrap().unwrap();
    db.create_keyword("alice", "quantum widgets", shopping.id).unwrap();
    let result = recategorize(&db, "alice", RecategorizeScope::All).unwrap();
    assert_eq!(result.processed, 6);
    assert_eq!(result.changed, 2);
    assert_eq!(result.uncategorized, 0);

    let pivot = db.pivot_table(&filter).unwrap();
    assert!(pivot.rows.iter().all(|r| r.category_id.is_some()));

    // A manual correction survives the next run
    let dining = db.find_category_by_name("alice", "Dining").unwrap().unwrap();
    let january_walmart = db
        .list_transactions(
            &TransactionFilter::new("alice")
                .search(Some("walmart"))
                .date_range(Some((d(2024, 1, 1), d(2024, 1, 31)))),
        )
        .unwrap();
    assert_eq!(january_walmart.len(), 1);
    let tx_id = january_walmart[0].transaction.id;
    db.set_transaction_category("alice", tx_id, Some(dining.id), false)
        .unwrap();

    let rerun = recategorize(&db, "alice", RecategorizeScope::All).unwrap();
    assert_eq!(rerun.skipped_manual, 1);
    assert_eq!(rerun.changed, 0);
    let tx = db.get_transaction("alice", tx_id).unwrap().unwrap();
    assert_eq!(tx.category_id, Some(dining.id));
    assert_eq!(tx.category_source, Some(CategorySource::Manual));

    // Reports agree with each other
    let summary = db.summary(&filter).unwrap();
    assert_eq!(summary.income, 2000.0);
    assert_eq!(summary.expenses, 107.24);
    assert_eq!(summary.net, 1892.76);
    assert_eq!(summary.transaction_count, 6);
    assert_eq!(summary.uncategorized_count, 0);

    let spending = db.spending_by_category(&filter).unwrap();
    assert_eq!(spending[0].category, "Dining");
    assert_eq!(spending[0].amount, 50.0);
    let total: f64 = spending.iter().map(|s| s.amount).sum();
    assert!((total - summary.expenses).abs() < 0.01);

    let by_bank = db.breakdown_by_bank(&filter).unwrap();
    assert_eq!(by_bank.len(), 1);
    assert_eq!(by_bank[0].bank, "Everyday Checking");
    assert_eq!(by_bank[0].net, summary.net);
}

#[test]
fn test_reimport_and_delete_import() {
    let (db, bank) = setup();
    let first = import(&db, &bank);

    let again = ingest_statement(
        &db,
        "alice",
        &bank,
        Some("checking.csv"),
        checking_csv().as_bytes(),
        IngestOptions::default(),
    )
    .unwrap();
    assert_eq!(again.import.imported, 0);
    assert_eq!(again.import.duplicates, 6);

    let removed = db.delete_import("alice", first).unwrap();
    assert_eq!(removed, 6);
    assert_eq!(
        db.count_transactions(&TransactionFilter::new("alice")).unwrap(),
        0
    );

    // The statement can be imported again once its transactions are gone
    let restored = ingest_statement(
        &db,
        "alice",
        &bank,
        Some("checking.csv"),
        checking_csv().as_bytes(),
        IngestOptions::default(),
    )
    .unwrap();
    assert_eq!(restored.import.imported, 6);
}

#[test]
fn test_users_are_isolated() {
    let (db, bank) = setup();
    import(&db, &bank);

    db.ensure_user("bob", None, "EUR").unwrap();
    assert_eq!(
        db.count_transactions(&TransactionFilter::new("bob")).unwrap(),
        0
    );
    assert!(db.get_bank("bob", bank.id).unwrap().is_none());

    let filter = db
        .report_filter("bob", d(2024, 1, 1), d(2024, 3, 31), None, None)
        .unwrap();
    assert_eq!(filter.currency, "EUR");
    let summary = db.summary(&filter).unwrap();
    assert_eq!(summary.transaction_count, 0);
    assert_eq!(summary.savings_rate, 0.0);
}
