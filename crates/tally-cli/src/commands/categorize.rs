//! Recategorization and AI suggestion commands

use anyhow::Result;
use tally_core::ai::{suggest_categories, CategorySuggester, SuggestOptions};
use tally_core::categorize::{recategorize, RecategorizeScope};
use tally_core::db::Database;

use super::truncate;

pub fn cmd_categorize(
    db: &Database,
    user_id: &str,
    scope: &str,
    import_id: Option<i64>,
) -> Result<()> {
    let scope = RecategorizeScope::parse(scope, import_id)?;
    println!("🏷️  Recategorizing ({})...", describe_scope(scope));

    let result = recategorize(db, user_id, scope)?;

    println!("   Processed: {}", result.processed);
    println!("   Changed: {}", result.changed);
    println!("   Unchanged: {}", result.unchanged);
    if result.skipped_manual > 0 {
        println!("   Manual (kept): {}", result.skipped_manual);
    }
    println!("   Still uncategorized: {}", result.uncategorized);
    if result.uncategorized > 0 {
        println!();
        println!("   💡 Tip: `tally suggest` asks Claude about the rest");
    }

    Ok(())
}

fn describe_scope(scope: RecategorizeScope) -> String {
    match scope {
        RecategorizeScope::All => "all transactions".to_string(),
        RecategorizeScope::Uncategorized => "uncategorized only".to_string(),
        RecategorizeScope::Import(id) => format!("import #{}", id),
    }
}

pub async fn cmd_suggest(
    db: &Database,
    suggester: &dyn CategorySuggester,
    user_id: &str,
    limit: i64,
    apply: bool,
    min_confidence: f64,
) -> Result<()> {
    if !(0.0..=1.0).contains(&min_confidence) {
        anyhow::bail!("--min-confidence must be between 0.0 and 1.0");
    }

    println!("🤖 Asking {} for category suggestions...", suggester.name());

    let result = suggest_categories(
        db,
        suggester,
        user_id,
        SuggestOptions {
            limit: limit.max(1),
            apply,
            min_confidence,
        },
    )
    .await?;

    if result.examined == 0 {
        println!("✅ Nothing to do: every transaction has a category");
        return Ok(());
    }

    println!(
        "   Examined {} transaction(s), {} distinct description(s)",
        result.examined, result.distinct
    );
    println!();
    println!(
        "   {:40} │ {:20} │ {:>5} │ {:>4}",
        "Description", "Category", "Conf", "Txns"
    );
    println!("   ─────────────────────────────────────────┼──────────────────────┼───────┼─────");
    for s in &result.suggestions {
        println!(
            "   {:40} │ {:20} │ {:>5.2} │ {:>4}",
            truncate(&s.description, 40),
            truncate(&s.category, 20),
            s.confidence,
            s.transaction_ids.len()
        );
    }

    println!();
    if result.discarded > 0 {
        println!("   Discarded (unknown category or low confidence): {}", result.discarded);
    }
    if result.errors > 0 {
        tracing::warn!(
            errors = result.errors,
            suggester = suggester.name(),
            "Some suggestion requests failed"
        );
        println!("   ⚠️  Failed requests: {}", result.errors);
    }
    if apply {
        println!("✅ Applied to {} transaction(s)", result.applied);
    } else {
        println!("   Dry run. Re-run with --apply to save these categories");
    }

    Ok(())
}
