//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::{recategorize, RecategorizeScope};
    use crate::import::{generate_hash, SkippedRow};
    use chrono::NaiveDate;

    const USER: &str = "user-1";
    const OTHER: &str = "user-2";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_db() -> (Database, Bank) {
        let db = Database::in_memory().unwrap();
        db.seed_defaults().unwrap();
        db.ensure_user(USER, Some("one@example.com"), "USD").unwrap();
        let bank = db
            .create_bank(
                USER,
                &NewBank {
                    name: "Checking".into(),
                    currency: "USD".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        (db, bank)
    }

    fn new_tx(date: NaiveDate, description: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            date,
            description: description.into(),
            amount,
            balance: None,
            reference: None,
            import_hash: generate_hash(&date, description, amount, 0),
            original_data: None,
        }
    }

    fn insert(db: &Database, bank: &Bank, date: NaiveDate, description: &str, amount: f64) -> i64 {
        db.insert_transaction(USER, bank.id, None, &bank.currency, &new_tx(date, description, amount))
            .unwrap()
            .unwrap()
    }

    fn category_id(db: &Database, name: &str) -> i64 {
        db.find_category_by_name(USER, name).unwrap().unwrap().id
    }

    #[test]
    fn test_seed_defaults_is_idempotent() {
        let (db, _) = setup_test_db();
        let categories = db.list_global_categories().unwrap().len();
        let rules = db.list_rules().unwrap().len();
        assert!(categories > 10);
        assert!(rules > 10);

        db.seed_defaults().unwrap();
        assert_eq!(db.list_global_categories().unwrap().len(), categories);
        assert_eq!(db.list_rules().unwrap().len(), rules);
        assert_eq!(db.seed_currencies().unwrap(), 0);
    }

    #[test]
    fn test_ensure_user_creates_once() {
        let (db, _) = setup_test_db();
        let user = db.ensure_user(USER, None, "EUR").unwrap();
        // Existing profile keeps its currency
        assert_eq!(user.default_currency, "USD");
        assert_eq!(user.email.as_deref(), Some("one@example.com"));

        let updated = db.ensure_user(USER, Some("new@example.com"), "USD").unwrap();
        assert_eq!(updated.email.as_deref(), Some("new@example.com"));

        let updated = db
            .update_user(
                USER,
                &UserUpdate {
                    display_name: Some("Ana".into()),
                    default_currency: Some("eur".into()),
                },
            )
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Ana"));
        assert_eq!(updated.default_currency, "EUR");

        assert!(matches!(
            db.ensure_user("new-user", None, "XXX"),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_currency_validation_and_in_use() {
        let (db, _) = setup_test_db();
        assert!(matches!(
            db.create_currency("US", "Bad", None),
            Err(Error::InvalidData(_))
        ));
        assert!(matches!(
            db.create_currency("usd", "Dup", None),
            Err(Error::Conflict(_))
        ));

        let sek = db.create_currency("sek", "Swedish Krona", Some("kr")).unwrap();
        assert_eq!(sek.code, "SEK");
        db.delete_currency("SEK").unwrap();
        assert!(matches!(db.delete_currency("SEK"), Err(Error::NotFound(_))));

        // Used by the bank and the user profile
        assert!(matches!(db.delete_currency("USD"), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_bank_crud() {
        let (db, bank) = setup_test_db();
        assert_eq!(bank.amount_sign, AmountSign::Normal);

        let dup = db.create_bank(
            USER,
            &NewBank {
                name: "checking".into(),
                currency: "USD".into(),
                ..Default::default()
            },
        );
        assert!(matches!(dup, Err(Error::Conflict(_))));

        let bad_format = db.create_bank(
            USER,
            &NewBank {
                name: "Card".into(),
                currency: "USD".into(),
                date_format: Some("%Q".into()),
                ..Default::default()
            },
        );
        assert!(matches!(bad_format, Err(Error::InvalidData(_))));

        let updated = db
            .update_bank(
                USER,
                bank.id,
                &BankUpdate {
                    date_format: Some("%d/%m/%Y".into()),
                    amount_sign: Some(AmountSign::Inverted),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.date_format.as_deref(), Some("%d/%m/%Y"));
        assert_eq!(updated.amount_sign, AmountSign::Inverted);

        let cleared = db
            .update_bank(
                USER,
                bank.id,
                &BankUpdate {
                    date_format: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.date_format.is_none());

        // Other users cannot see it
        db.ensure_user(OTHER, None, "USD").unwrap();
        assert!(db.get_bank(OTHER, bank.id).unwrap().is_none());
        assert!(db.list_banks(OTHER).unwrap().is_empty());
    }

    #[test]
    fn test_delete_bank_requires_force() {
        let (db, bank) = setup_test_db();
        insert(&db, &bank, d(2024, 1, 5), "COFFEE", -4.5);

        assert!(matches!(
            db.delete_bank(USER, bank.id, false),
            Err(Error::Conflict(_))
        ));
        assert_eq!(db.delete_bank(USER, bank.id, true).unwrap(), 1);
        assert!(db.get_bank(USER, bank.id).unwrap().is_none());
        assert_eq!(
            db.count_transactions(&TransactionFilter::new(USER)).unwrap(),
            0
        );
    }

    #[test]
    fn test_category_visibility_and_permissions() {
        let (db, _) = setup_test_db();
        db.ensure_user(OTHER, None, "USD").unwrap();

        let pets = db
            .create_category(
                Some(USER),
                &NewCategory {
                    name: "Pets".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(!pets.is_global());

        let globals = db.list_global_categories().unwrap().len();
        assert_eq!(db.list_categories(USER).unwrap().len(), globals + 1);
        assert_eq!(db.list_categories(OTHER).unwrap().len(), globals);

        // Same name as a global category is a conflict
        let dup = db.create_category(
            Some(USER),
            &NewCategory {
                name: "groceries".into(),
                ..Default::default()
            },
        );
        assert!(matches!(dup, Err(Error::Conflict(_))));

        // Other user cannot see or change it
        assert!(matches!(
            db.get_visible_category(OTHER, pets.id),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            db.delete_category(OTHER, false, pets.id),
            Err(Error::NotFound(_))
        ));

        // Global categories are admin-only
        let groceries = category_id(&db, "Groceries");
        let rename = CategoryUpdate {
            name: Some("Food".into()),
            ..Default::default()
        };
        assert!(matches!(
            db.update_category(USER, false, groceries, &rename),
            Err(Error::Forbidden(_))
        ));
        let renamed = db.update_category(USER, true, groceries, &rename).unwrap();
        assert_eq!(renamed.name, "Food");

        let updated = db
            .update_category(
                USER,
                false,
                pets.id,
                &CategoryUpdate {
                    color: Some("#ff0000".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.color.as_deref(), Some("#ff0000"));
        assert_eq!(updated.name, "Pets");
    }

    #[test]
    fn test_delete_category_uncategorizes() {
        let (db, bank) = setup_test_db();
        let pets = db
            .create_category(
                Some(USER),
                &NewCategory {
                    name: "Pets".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        db.create_keyword(USER, "petco", pets.id).unwrap();
        let tx_id = insert(&db, &bank, d(2024, 1, 5), "PETCO 123", -30.0);
        recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(
            db.get_transaction(USER, tx_id).unwrap().unwrap().category_id,
            Some(pets.id)
        );

        assert_eq!(db.delete_category(USER, false, pets.id).unwrap(), 1);
        let tx = db.get_transaction(USER, tx_id).unwrap().unwrap();
        assert!(tx.category_id.is_none());
        assert!(tx.category_source.is_none());
        assert!(db.list_keywords(USER).unwrap().is_empty());
    }

    #[test]
    fn test_rule_validation() {
        let (db, _) = setup_test_db();
        let groceries = category_id(&db, "Groceries");

        assert!(matches!(
            db.create_rule(groceries, "([unclosed", PatternType::Regex, 0),
            Err(Error::Regex(_))
        ));
        assert!(matches!(
            db.create_rule(groceries, "  ", PatternType::Contains, 0),
            Err(Error::InvalidData(_))
        ));

        let pets = db
            .create_category(
                Some(USER),
                &NewCategory {
                    name: "Pets".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(matches!(
            db.create_rule(pets.id, "PETCO", PatternType::Contains, 0),
            Err(Error::InvalidData(_))
        ));

        let rule = db
            .create_rule(groceries, r"^FRESH\s+MARKET", PatternType::Regex, 99)
            .unwrap();
        assert_eq!(db.list_rules().unwrap()[0].id, rule.id);
        let listed = db.list_rules_with_category().unwrap();
        assert_eq!(listed[0].category_name, "Groceries");

        db.delete_rule(rule.id).unwrap();
        assert!(matches!(db.delete_rule(rule.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_keywords_are_normalized_and_unique() {
        let (db, _) = setup_test_db();
        let dining = category_id(&db, "Dining");

        let kw = db.create_keyword(USER, "  joe's   diner ", dining).unwrap();
        assert_eq!(kw.keyword, "JOE'S DINER");
        assert!(matches!(
            db.create_keyword(USER, "JOE'S DINER", dining),
            Err(Error::Conflict(_))
        ));
        assert!(matches!(
            db.create_keyword(USER, "x", 999_999),
            Err(Error::NotFound(_))
        ));

        // Upsert moves an existing keyword
        let travel = category_id(&db, "Travel");
        let moved = db.set_keyword(USER, "joe's diner", travel).unwrap();
        assert_eq!(moved.id, kw.id);
        assert_eq!(moved.category_id, travel);

        let listed = db.list_keywords_with_category(USER).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].category_name, "Travel");

        db.ensure_user(OTHER, None, "USD").unwrap();
        assert!(matches!(
            db.delete_keyword(OTHER, kw.id),
            Err(Error::NotFound(_))
        ));
        db.delete_keyword(USER, kw.id).unwrap();
    }

    #[test]
    fn test_insert_transaction_dedup_per_bank() {
        let (db, bank) = setup_test_db();
        let other_bank = db
            .create_bank(
                USER,
                &NewBank {
                    name: "Savings".into(),
                    currency: "USD".into(),
                    ..Default::default()
                },
            )
            .unwrap();

        let tx = new_tx(d(2024, 1, 5), "COFFEE", -4.5);
        assert!(db.insert_transaction(USER, bank.id, None, "USD", &tx).unwrap().is_some());
        assert!(db.insert_transaction(USER, bank.id, None, "USD", &tx).unwrap().is_none());
        assert!(db
            .insert_transaction(USER, other_bank.id, None, "USD", &tx)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_list_transactions_with_filter() {
        let (db, bank) = setup_test_db();
        insert(&db, &bank, d(2024, 1, 5), "WALMART 001", -50.0);
        insert(&db, &bank, d(2024, 1, 20), "STARBUCKS", -5.0);
        insert(&db, &bank, d(2024, 2, 1), "PAYROLL ACME", 2000.0);
        insert(&db, &bank, d(2024, 2, 3), "MYSTERY SHOP", -12.0);
        recategorize(&db, USER, RecategorizeScope::All).unwrap();

        let all = db.list_transactions(&TransactionFilter::new(USER)).unwrap();
        assert_eq!(all.len(), 4);
        // Newest first
        assert_eq!(all[0].transaction.description, "MYSTERY SHOP");
        assert_eq!(all[0].bank_name, "Checking");

        let january = TransactionFilter::new(USER).date_range(Some((d(2024, 1, 1), d(2024, 1, 31))));
        assert_eq!(db.count_transactions(&january).unwrap(), 2);

        let uncategorized = TransactionFilter::new(USER).uncategorized(true);
        let rows = db.list_transactions(&uncategorized).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].category_name.is_none());

        let groceries = TransactionFilter::new(USER).category_id(Some(category_id(&db, "Groceries")));
        let rows = db.list_transactions(&groceries).unwrap();
        assert_eq!(rows[0].category_name.as_deref(), Some("Groceries"));

        let search = TransactionFilter::new(USER).search(Some("star"));
        assert_eq!(db.count_transactions(&search).unwrap(), 1);

        let page = TransactionFilter::new(USER).limit(Some(2)).offset(Some(2));
        let rows = db.list_transactions(&page).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction.description, "STARBUCKS");
        assert_eq!(db.count_transactions(&page).unwrap(), 4);

        db.ensure_user(OTHER, None, "USD").unwrap();
        assert_eq!(db.count_transactions(&TransactionFilter::new(OTHER)).unwrap(), 0);
    }

    #[test]
    fn test_manual_category_survives_recategorize() {
        let (db, bank) = setup_test_db();
        let tx_id = insert(&db, &bank, d(2024, 1, 5), "WALMART 001", -50.0);
        recategorize(&db, USER, RecategorizeScope::All).unwrap();
        let groceries = category_id(&db, "Groceries");
        assert_eq!(
            db.get_transaction(USER, tx_id).unwrap().unwrap().category_source,
            Some(CategorySource::Rule)
        );

        let shopping = category_id(&db, "Shopping");
        let tx = db.set_transaction_category(USER, tx_id, Some(shopping), false).unwrap();
        assert_eq!(tx.category_id, Some(shopping));
        assert_eq!(tx.category_source, Some(CategorySource::Manual));

        let result = recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(result.skipped_manual, 1);
        assert_eq!(result.changed, 0);
        assert_eq!(
            db.get_transaction(USER, tx_id).unwrap().unwrap().category_id,
            Some(shopping)
        );

        // Clearing hands it back to the cascade
        db.set_transaction_category(USER, tx_id, None, false).unwrap();
        recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(
            db.get_transaction(USER, tx_id).unwrap().unwrap().category_id,
            Some(groceries)
        );
    }

    #[test]
    fn test_remember_creates_keyword() {
        let (db, bank) = setup_test_db();
        let first = insert(&db, &bank, d(2024, 1, 5), "Corner Deli", -8.0);
        let second = insert(&db, &bank, d(2024, 1, 12), "CORNER  DELI", -9.0);
        let dining = category_id(&db, "Dining");

        db.set_transaction_category(USER, first, Some(dining), true).unwrap();
        let keywords = db.list_keywords(USER).unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].keyword, "CORNER DELI");

        let result = recategorize(&db, USER, RecategorizeScope::Uncategorized).unwrap();
        assert_eq!(result.changed, 1);
        let tx = db.get_transaction(USER, second).unwrap().unwrap();
        assert_eq!(tx.category_id, Some(dining));
        assert_eq!(tx.category_source, Some(CategorySource::Keyword));

        assert!(matches!(
            db.set_transaction_category(USER, first, None, true),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_recategorize_is_idempotent() {
        let (db, bank) = setup_test_db();
        insert(&db, &bank, d(2024, 1, 5), "WALMART 001", -50.0);
        insert(&db, &bank, d(2024, 1, 6), "UBER EATS ORDER", -20.0);
        insert(&db, &bank, d(2024, 1, 7), "UNKNOWN", -1.0);

        let first = recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(first.processed, 3);
        assert_eq!(first.changed, 2);
        assert_eq!(first.uncategorized, 1);

        let second = recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(second.changed, 0);
        assert_eq!(second.unchanged, 3);
    }

    #[test]
    fn test_ai_category_kept_without_match() {
        let (db, bank) = setup_test_db();
        let tx_id = insert(&db, &bank, d(2024, 1, 7), "OBSCURE VENDOR", -1.0);
        let travel = category_id(&db, "Travel");
        db.update_transaction_category(tx_id, Some(travel), Some(CategorySource::Ai))
            .unwrap();

        let result = recategorize(&db, USER, RecategorizeScope::All).unwrap();
        assert_eq!(result.changed, 0);
        assert_eq!(
            db.get_transaction(USER, tx_id).unwrap().unwrap().category_id,
            Some(travel)
        );

        // A keyword takes over
        let dining = category_id(&db, "Dining");
        db.create_keyword(USER, "obscure", dining).unwrap();
        recategorize(&db, USER, RecategorizeScope::All).unwrap();
        let tx = db.get_transaction(USER, tx_id).unwrap().unwrap();
        assert_eq!(tx.category_id, Some(dining));
        assert_eq!(tx.category_source, Some(CategorySource::Keyword));
    }

    #[test]
    fn test_import_lifecycle() {
        let (db, bank) = setup_test_db();
        let import_id = db
            .create_import(USER, bank.id, Some("jan.csv"), StatementFormat::Csv)
            .unwrap();
        let tx = new_tx(d(2024, 1, 5), "COFFEE", -4.5);
        db.insert_transaction(USER, bank.id, Some(import_id), "USD", &tx)
            .unwrap()
            .unwrap();

        let counts = ImportCounts {
            rows_parsed: 1,
            rows_skipped: 1,
            imported: 1,
            duplicates: 0,
            categorized: 1,
        };
        let skipped = vec![SkippedRow {
            row: 4,
            reason: "missing amount".into(),
        }];
        db.finish_import(import_id, &counts, &skipped).unwrap();

        let details = db.get_import_details(USER, import_id).unwrap().unwrap();
        assert_eq!(details.import.imported, 1);
        assert_eq!(details.import.filename.as_deref(), Some("jan.csv"));
        assert_eq!(details.skipped, skipped);
        assert_eq!(db.list_imports(USER, 10).unwrap().len(), 1);

        let scoped = TransactionFilter::new(USER).import_id(Some(import_id));
        assert_eq!(db.count_transactions(&scoped).unwrap(), 1);

        assert_eq!(db.delete_import(USER, import_id).unwrap(), 1);
        assert!(db.get_import(USER, import_id).unwrap().is_none());
        assert_eq!(db.count_transactions(&TransactionFilter::new(USER)).unwrap(), 0);
        assert!(matches!(
            recategorize(&db, USER, RecategorizeScope::Import(import_id)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_reports() {
        let (db, bank) = setup_test_db();
        let eur_bank = db
            .create_bank(
                USER,
                &NewBank {
                    name: "Euro Account".into(),
                    currency: "EUR".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        insert(&db, &bank, d(2024, 1, 5), "WALMART 001", -60.0);
        insert(&db, &bank, d(2024, 1, 20), "STARBUCKS", -15.0);
        insert(&db, &bank, d(2024, 3, 1), "PAYROLL ACME", 1000.0);
        insert(&db, &bank, d(2024, 3, 3), "MYSTERY SHOP", -25.0);
        insert(&db, &eur_bank, d(2024, 1, 8), "WALMART EU", -999.0);
        recategorize(&db, USER, RecategorizeScope::All).unwrap();

        let filter = db
            .report_filter(USER, d(2024, 1, 1), d(2024, 3, 31), None, None)
            .unwrap();
        assert_eq!(filter.currency, "USD");

        let pivot = db.pivot_table(&filter).unwrap();
        assert_eq!(pivot.months, vec!["2024-01", "2024-02", "2024-03"]);
        let last = pivot.rows.last().unwrap();
        assert_eq!(last.category, "Uncategorized");
        assert_eq!(last.cells, vec![0.0, 0.0, -25.0]);
        let groceries = pivot.rows.iter().find(|r| r.category == "Groceries").unwrap();
        assert_eq!(groceries.total, -60.0);
        assert_eq!(pivot.column_totals, vec![-75.0, 0.0, 975.0]);
        assert_eq!(pivot.grand_total, 900.0);
        // Income rows come first
        assert_eq!(pivot.rows[0].category, "Salary");

        let by_category = db.spending_by_category(&filter).unwrap();
        assert_eq!(by_category[0].category, "Groceries");
        assert_eq!(by_category[0].amount, 60.0);
        assert_eq!(by_category[0].percentage, 60.0);
        let total_pct: f64 = by_category.iter().map(|c| c.percentage).sum();
        assert!((total_pct - 100.0).abs() < 0.01);

        let by_bank = db.breakdown_by_bank(&filter).unwrap();
        assert_eq!(by_bank.len(), 1);
        assert_eq!(by_bank[0].income, 1000.0);
        assert_eq!(by_bank[0].expenses, 100.0);
        assert_eq!(by_bank[0].net, 900.0);

        let summary = db.summary(&filter).unwrap();
        assert_eq!(summary.transaction_count, 4);
        assert_eq!(summary.uncategorized_count, 1);
        assert_eq!(summary.savings_rate, 0.9);

        // EUR is reported on its own
        let eur = db
            .report_filter(USER, d(2024, 1, 1), d(2024, 3, 31), Some(eur_bank.id), None)
            .unwrap();
        assert_eq!(eur.currency, "EUR");
        assert_eq!(db.summary(&eur).unwrap().expenses, 999.0);

        assert!(matches!(
            db.report_filter(USER, d(2024, 3, 1), d(2024, 1, 1), None, None),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_pivot_omits_empty_uncategorized_row() {
        let (db, bank) = setup_test_db();
        insert(&db, &bank, d(2024, 1, 5), "WALMART 001", -60.0);
        recategorize(&db, USER, RecategorizeScope::All).unwrap();

        let filter = db
            .report_filter(USER, d(2024, 1, 1), d(2024, 1, 31), None, None)
            .unwrap();
        let pivot = db.pivot_table(&filter).unwrap();
        assert_eq!(pivot.rows.len(), 1);
        assert!(pivot.rows.iter().all(|r| r.category_id.is_some()));
    }

    #[test]
    fn test_audit_log() {
        let (db, _) = setup_test_db();
        db.log_audit(USER, "import", Some("import"), Some(1), Some("jan.csv"))
            .unwrap();
        db.log_audit(USER, "recategorize", None, None, None).unwrap();
        db.log_audit(OTHER, "import", None, None, None).unwrap();

        let entries = db.list_audit_log(USER, 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "recategorize");
        assert_eq!(entries[1].details.as_deref(), Some("jan.csv"));
    }
}
