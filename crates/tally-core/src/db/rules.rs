//! Global category rule operations

use rusqlite::{params, OptionalExtension, Row};
use tracing::{info, warn};

use super::{parse_datetime, Database};
use crate::categorize::Matcher;
use crate::error::{Error, Result};
use crate::models::{CategoryRule, CategoryRuleWithCategory, PatternType};

/// Default rule table: (category name, pattern, type, priority)
///
/// Priorities order overlapping merchants: food delivery before rides,
/// subscriptions before general shopping.
const DEFAULT_RULES: &[(&str, &str, PatternType, i32)] = &[
    (
        "Subscriptions",
        "NETFLIX|SPOTIFY|HULU|DISNEY PLUS|DISNEY+|YOUTUBE PREMIUM|APPLE.COM/BILL|AMAZON PRIME|HBO MAX",
        PatternType::Contains,
        30,
    ),
    (
        "Dining",
        "UBER EATS|DOORDASH|DELIVEROO|GRUBHUB|RAPPI|JUST EAT",
        PatternType::Contains,
        30,
    ),
    (
        "Salary",
        "PAYROLL|SALARY|DIRECT DEPOSIT|NOMINA|GEHALT",
        PatternType::Contains,
        25,
    ),
    (
        "Refunds",
        "REFUND|REEMBOLSO|RETURN CREDIT",
        PatternType::Contains,
        25,
    ),
    (
        "Fees & Charges",
        r"\b(FEE|OVERDRAFT|COMMISSION|COMISION|SERVICE CHARGE)\b",
        PatternType::Regex,
        20,
    ),
    (
        "Interest",
        "INTEREST EARNED|INTEREST PAYMENT|DIVIDEND",
        PatternType::Contains,
        20,
    ),
    (
        "Transfers",
        "TRANSFER|TRANSFERENCIA|ZELLE|VENMO|UEBERWEISUNG",
        PatternType::Contains,
        15,
    ),
    (
        "Groceries",
        "WALMART|KROGER|SAFEWAY|WHOLE FOODS|TRADER JOE|ALDI|LIDL|TESCO|SAINSBURY|CARREFOUR|MERCADONA|COSTCO|SUPERMARKET|GROCERY",
        PatternType::Contains,
        10,
    ),
    (
        "Dining",
        "RESTAURANT|CAFE|COFFEE|STARBUCKS|MCDONALD|BURGER KING|PIZZA|TACO BELL|CHIPOTLE",
        PatternType::Contains,
        10,
    ),
    (
        "Transport",
        "UBER|LYFT|TAXI|CABIFY|PARKING|TRANSIT|METRO|TOLL|SHELL|CHEVRON|EXXON|FUEL|GASOLINE",
        PatternType::Contains,
        10,
    ),
    (
        "Housing",
        r"\b(RENT|MORTGAGE|LANDLORD|HOA)\b",
        PatternType::Regex,
        10,
    ),
    (
        "Utilities",
        "ELECTRIC|WATER BILL|GAS BILL|INTERNET|COMCAST|VERIZON|AT&T|T-MOBILE|VODAFONE",
        PatternType::Contains,
        10,
    ),
    (
        "Healthcare",
        "PHARMACY|FARMACIA|CVS|WALGREENS|DOCTOR|HOSPITAL|CLINIC|DENTAL",
        PatternType::Contains,
        10,
    ),
    (
        "Travel",
        "AIRLINES|AIRWAYS|HOTEL|AIRBNB|BOOKING.COM|EXPEDIA|RYANAIR|EASYJET",
        PatternType::Contains,
        10,
    ),
    (
        "Entertainment",
        "CINEMA|THEATER|THEATRE|TICKETMASTER|STEAM GAMES|PLAYSTATION|XBOX",
        PatternType::Contains,
        10,
    ),
    (
        "Education",
        "TUITION|UNIVERSITY|COURSERA|UDEMY|BOOKSTORE",
        PatternType::Contains,
        10,
    ),
    (
        "Personal Care",
        "SALON|BARBER|GYM|FITNESS",
        PatternType::Contains,
        10,
    ),
    (
        "Taxes",
        r"\b(IRS|HMRC|TAX PAYMENT|PROPERTY TAX)\b",
        PatternType::Regex,
        10,
    ),
    (
        "Shopping",
        "AMAZON|AMZN|TARGET|EBAY|IKEA|BEST BUY|ZARA|MERCADO LIBRE",
        PatternType::Contains,
        5,
    ),
];

const RULE_COLUMNS: &str = "r.id, r.category_id, r.pattern, r.pattern_type, r.priority, r.created_at";

impl Database {
    fn row_to_rule(row: &Row) -> rusqlite::Result<CategoryRule> {
        let pattern_type: String = row.get(3)?;
        let created_at: String = row.get(5)?;
        Ok(CategoryRule {
            id: row.get(0)?,
            category_id: row.get(1)?,
            pattern: row.get(2)?,
            pattern_type: pattern_type.parse().unwrap_or(PatternType::Contains),
            priority: row.get(4)?,
            created_at: parse_datetime(&created_at),
        })
    }

    /// List all rules in evaluation order (priority desc, then id)
    pub fn list_rules(&self) -> Result<Vec<CategoryRule>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM category_rules r ORDER BY r.priority DESC, r.id",
            RULE_COLUMNS
        ))?;
        let rules = stmt
            .query_map([], Self::row_to_rule)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// List all rules with their category names
    pub fn list_rules_with_category(&self) -> Result<Vec<CategoryRuleWithCategory>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {}, c.name
            FROM category_rules r
            JOIN categories c ON c.id = r.category_id
            ORDER BY r.priority DESC, r.id
            "#,
            RULE_COLUMNS
        ))?;
        let rules = stmt
            .query_map([], |row| {
                Ok(CategoryRuleWithCategory {
                    rule: Self::row_to_rule(row)?,
                    category_name: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// Get a rule by id
    pub fn get_rule(&self, id: i64) -> Result<Option<CategoryRule>> {
        let conn = self.conn()?;
        let rule = conn
            .query_row(
                &format!("SELECT {} FROM category_rules r WHERE r.id = ?", RULE_COLUMNS),
                params![id],
                Self::row_to_rule,
            )
            .optional()?;
        Ok(rule)
    }

    /// Create a rule
    ///
    /// The pattern must compile, and the rule must target a global category.
    pub fn create_rule(
        &self,
        category_id: i64,
        pattern: &str,
        pattern_type: PatternType,
        priority: i32,
    ) -> Result<CategoryRule> {
        Matcher::compile(pattern, pattern_type)?;

        let category = self
            .get_category(category_id)?
            .ok_or_else(|| Error::NotFound(format!("Category {}", category_id)))?;
        if !category.is_global() {
            return Err(Error::InvalidData(format!(
                "Rules must target a global category; '{}' belongs to a user",
                category.name
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO category_rules (category_id, pattern, pattern_type, priority)
            VALUES (?, ?, ?, ?)
            "#,
            params![category_id, pattern.trim(), pattern_type.as_str(), priority],
        )?;
        let id = conn.last_insert_rowid();
        info!(rule_id = id, category_id, pattern_type = %pattern_type, "Created rule");

        self.get_rule(id)?
            .ok_or_else(|| Error::NotFound(format!("Rule {}", id)))
    }

    /// Delete a rule
    pub fn delete_rule(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM category_rules WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("Rule {}", id)));
        }
        Ok(())
    }

    /// Seed the default rule table (idempotent)
    ///
    /// Requires the global categories to exist; rules for missing categories
    /// are skipped.
    pub fn seed_default_rules(&self) -> Result<usize> {
        let conn = self.conn()?;
        let mut inserted = 0;

        for (category, pattern, pattern_type, priority) in DEFAULT_RULES {
            let category_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM categories WHERE name = ? AND user_id IS NULL",
                    params![category],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(category_id) = category_id else {
                warn!(category, "Skipping default rule for missing category");
                continue;
            };

            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM category_rules WHERE category_id = ? AND pattern = ?",
                    params![category_id, pattern],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if !exists {
                conn.execute(
                    r#"
                    INSERT INTO category_rules (category_id, pattern, pattern_type, priority)
                    VALUES (?, ?, ?, ?)
                    "#,
                    params![category_id, pattern, pattern_type.as_str(), priority],
                )?;
                inserted += 1;
            }
        }

        Ok(inserted)
    }
}
