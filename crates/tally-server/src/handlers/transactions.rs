//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::reports::parse_date_param;
use crate::{AppError, AppState, AuthUser, SuccessResponse, MAX_PAGE_LIMIT};
use tally_core::db::TransactionFilter;
use tally_core::models::{Transaction, TransactionWithDetails};

/// Query parameters for listing transactions
#[derive(Debug, Deserialize)]
pub struct TransactionQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    pub bank_id: Option<i64>,
    pub category_id: Option<i64>,
    pub import_id: Option<i64>,
    /// Only transactions without a category (overrides category_id)
    #[serde(default)]
    pub uncategorized: bool,
    /// Case-insensitive description search
    pub search: Option<String>,
    /// Start date (YYYY-MM-DD), inclusive
    pub from: Option<String>,
    /// End date (YYYY-MM-DD), inclusive
    pub to: Option<String>,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub transactions: Vec<TransactionWithDetails>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for setting a transaction's category
#[derive(Debug, Deserialize)]
pub struct SetCategoryRequest {
    /// null clears the category and hands the transaction back to the cascade
    pub category_id: Option<i64>,
    /// Also learn a keyword from the description
    #[serde(default)]
    pub remember: bool,
}

/// GET /api/transactions - List transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<TransactionQuery>,
) -> Result<Json<TransactionResponse>, AppError> {
    // Input validation: clamp pagination parameters
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    let offset = params.offset.max(0);

    let date_range = match (params.from.as_deref(), params.to.as_deref()) {
        (None, None) => None,
        (from, to) => {
            let from = match from {
                Some(s) => parse_date_param(s, "from")?,
                None => NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default(),
            };
            let to = match to {
                Some(s) => parse_date_param(s, "to")?,
                None => NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or_default(),
            };
            Some((from, to))
        }
    };

    let filter = TransactionFilter::new(&user.id)
        .bank_id(params.bank_id)
        .category_id(params.category_id)
        .import_id(params.import_id)
        .uncategorized(params.uncategorized)
        .search(params.search.as_deref())
        .date_range(date_range);

    let total = state.db.count_transactions(&filter)?;
    let transactions = state
        .db
        .list_transactions(&filter.limit(Some(limit)).offset(Some(offset)))?;

    Ok(Json(TransactionResponse {
        transactions,
        total,
        limit,
        offset,
    }))
}

/// GET /api/transactions/:id - Get a single transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state
        .db
        .get_transaction(&user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Transaction {} not found", id)))?;
    Ok(Json(tx))
}

/// PUT /api/transactions/:id/category - Set or clear a transaction's category
///
/// A category set here is manual and survives recategorization.
pub async fn set_transaction_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<SetCategoryRequest>,
) -> Result<Json<Transaction>, AppError> {
    let tx = state
        .db
        .set_transaction_category(&user.id, id, req.category_id, req.remember)?;

    state.db.log_audit(
        &user.id,
        "categorize",
        Some("transaction"),
        Some(id),
        Some(&format!(
            "category_id={}, remember={}",
            req.category_id
                .map(|c| c.to_string())
                .unwrap_or_else(|| "none".into()),
            req.remember
        )),
    )?;

    Ok(Json(tx))
}

/// DELETE /api/transactions/:id - Delete a transaction
pub async fn delete_transaction(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_transaction(&user.id, id)?;

    state
        .db
        .log_audit(&user.id, "delete", Some("transaction"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
