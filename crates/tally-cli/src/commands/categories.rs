//! Category, keyword and rule command implementations

use anyhow::{Context, Result};
use tally_core::categorize::Categorizer;
use tally_core::db::Database;
use tally_core::models::{CategoryKind, NewCategory, PatternType};

use super::{resolve_category, truncate};

// ========== Categories ==========

pub fn cmd_categories_list(db: &Database, user_id: &str) -> Result<()> {
    let categories = db.list_categories(user_id)?;

    println!();
    println!("📂 Categories");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:>4} │ {:24} │ {:8} │ {:6} │ {}",
        "ID", "Name", "Kind", "Scope", "Color"
    );
    println!("   ─────┼──────────────────────────┼──────────┼────────┼─────────");

    for category in &categories {
        println!(
            "   {:>4} │ {:24} │ {:8} │ {:6} │ {}",
            category.id,
            truncate(&category.name, 24),
            category.kind.as_str(),
            if category.is_global() { "global" } else { "custom" },
            category.color.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

pub fn cmd_categories_add(
    db: &Database,
    user_id: &str,
    name: &str,
    kind: &str,
    color: Option<&str>,
) -> Result<()> {
    let kind: CategoryKind = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let category = db.create_category(
        Some(user_id),
        &NewCategory {
            name: name.to_string(),
            kind,
            color: color.map(String::from),
        },
    )?;
    println!("✅ Created category #{}: {} ({})", category.id, category.name, category.kind);
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, user_id: &str, id: i64) -> Result<()> {
    let uncategorized = db.delete_category(user_id, false, id)?;
    println!(
        "✅ Deleted category #{} ({} transaction(s) now uncategorized)",
        id, uncategorized
    );
    Ok(())
}

// ========== Keywords ==========

pub fn cmd_keywords_list(db: &Database, user_id: &str) -> Result<()> {
    let keywords = db.list_keywords_with_category(user_id)?;

    if keywords.is_empty() {
        println!("No keywords yet. Add one with:");
        println!("  tally keywords add \"corner bakery\" --category Dining");
        println!("or remember a correction:");
        println!("  tally transactions set-category <id> Dining --remember");
        return Ok(());
    }

    println!("{:>5}  {:<40}  {}", "ID", "Keyword", "Category");
    println!("{}", "-".repeat(70));
    for k in &keywords {
        println!(
            "{:>5}  {:<40}  {}",
            k.keyword.id,
            truncate(&k.keyword.keyword, 40),
            k.category_name
        );
    }

    Ok(())
}

pub fn cmd_keywords_add(
    db: &Database,
    user_id: &str,
    keyword: &str,
    category_name: &str,
) -> Result<()> {
    let category = resolve_category(db, user_id, category_name)?;
    let created = db.create_keyword(user_id, keyword, category.id)?;
    println!(
        "✅ Created keyword #{}: {} -> {}",
        created.id, created.keyword, category.name
    );
    Ok(())
}

pub fn cmd_keywords_delete(db: &Database, user_id: &str, id: i64) -> Result<()> {
    db.delete_keyword(user_id, id)?;
    println!("✅ Deleted keyword #{}", id);
    Ok(())
}

// ========== Rules ==========

pub fn cmd_rules_list(db: &Database) -> Result<()> {
    let rules = db.list_rules_with_category()?;

    if rules.is_empty() {
        println!("No rules defined. Add one with:");
        println!("  tally rules add --category <name> --pattern <text> [--pattern-type contains|starts_with|exact|regex]");
        return Ok(());
    }

    println!();
    println!("📋 Category Rules");
    println!("   ─────────────────────────────────────────────────────────────");
    println!(
        "   {:>4} │ {:>4} │ {:20} │ {:11} │ {}",
        "ID", "Pri", "Category", "Type", "Pattern"
    );
    println!("   ─────┼──────┼──────────────────────┼─────────────┼─────────────────");

    for rule in rules {
        println!(
            "   {:>4} │ {:>4} │ {:20} │ {:11} │ {}",
            rule.rule.id,
            rule.rule.priority,
            truncate(&rule.category_name, 20),
            rule.rule.pattern_type.as_str(),
            truncate(&rule.rule.pattern, 40)
        );
    }

    Ok(())
}

pub fn cmd_rules_add(
    db: &Database,
    category_name: &str,
    pattern: &str,
    pattern_type_str: &str,
    priority: i32,
) -> Result<()> {
    let category = db
        .list_global_categories()?
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(category_name.trim()))
        .with_context(|| {
            format!(
                "Global category '{}' not found (rules can only target global categories)",
                category_name
            )
        })?;

    let pattern_type: PatternType = pattern_type_str
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let rule = db.create_rule(category.id, pattern, pattern_type, priority)?;
    println!(
        "✅ Created rule #{} for '{}': {} ({})",
        rule.id,
        category.name,
        rule.pattern,
        pattern_type.as_str()
    );

    Ok(())
}

pub fn cmd_rules_delete(db: &Database, id: i64) -> Result<()> {
    db.delete_rule(id)?;
    println!("✅ Deleted rule #{}", id);

    Ok(())
}

pub fn cmd_rules_test(db: &Database, user_id: &str, description: &str) -> Result<()> {
    let categorizer = Categorizer::for_user(db, user_id)?;
    let explanation = categorizer.explain(description);

    let category_name = |id: i64| -> Result<String> {
        Ok(db
            .get_category(id)?
            .map(|c| c.name)
            .unwrap_or_else(|| format!("#{}", id)))
    };

    println!();
    println!("🔍 \"{}\"", description);
    println!("   Normalized: {}", explanation.normalized);
    println!("   ─────────────────────────────────────────────────────────────");

    for k in &explanation.matching_keywords {
        println!(
            "   Keyword #{} \"{}\" -> {}",
            k.keyword_id,
            k.keyword,
            category_name(k.category_id)?
        );
    }
    for r in &explanation.matching_rules {
        println!(
            "   Rule #{} (priority {}) -> {} ({}: {})",
            r.rule_id,
            r.priority,
            category_name(r.category_id)?,
            r.pattern_type.as_str(),
            truncate(&r.pattern, 40)
        );
    }

    match &explanation.result {
        Some(m) => println!(
            "   ✅ Result: {} (by {})",
            category_name(m.category_id)?,
            m.source
        ),
        None => println!("   ⚪ Result: Uncategorized"),
    }

    Ok(())
}
