//! Category rule handlers
//!
//! Rules are global; only the service role may add or remove them.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, SuccessResponse};
use tally_core::categorize::{Categorizer, Explanation};
use tally_core::models::{CategoryRule, CategoryRuleWithCategory, PatternType};

/// Request body for creating a rule
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub category_id: i64,
    pub pattern: String,
    #[serde(default = "default_pattern_type")]
    pub pattern_type: PatternType,
    #[serde(default)]
    pub priority: i32,
}

fn default_pattern_type() -> PatternType {
    PatternType::Contains
}

/// Request body for testing the cascade
#[derive(Debug, Deserialize)]
pub struct TestRulesRequest {
    pub description: String,
}

/// GET /api/rules - List rules, highest priority first
pub async fn list_rules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryRuleWithCategory>>, AppError> {
    Ok(Json(state.db.list_rules_with_category()?))
}

/// POST /api/rules - Create a rule (admin)
pub async fn create_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateRuleRequest>,
) -> Result<Json<CategoryRule>, AppError> {
    user.require_admin()?;

    let rule = state
        .db
        .create_rule(req.category_id, &req.pattern, req.pattern_type, req.priority)?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("rule"),
        Some(rule.id),
        Some(&format!(
            "pattern={}, type={}, category_id={}",
            rule.pattern, rule.pattern_type, rule.category_id
        )),
    )?;

    Ok(Json(rule))
}

/// DELETE /api/rules/:id - Delete a rule (admin)
pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    user.require_admin()?;

    state.db.delete_rule(id)?;

    state
        .db
        .log_audit(&user.id, "delete", Some("rule"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/rules/test - Show how the cascade would categorize a description
pub async fn test_rules(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<TestRulesRequest>,
) -> Result<Json<Explanation>, AppError> {
    if req.description.trim().is_empty() {
        return Err(AppError::bad_request("Description cannot be empty"));
    }

    let categorizer = Categorizer::for_user(&state.db, &user.id)?;
    Ok(Json(categorizer.explain(&req.description)))
}
