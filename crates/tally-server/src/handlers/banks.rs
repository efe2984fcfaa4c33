//! Bank handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthUser};
use tally_core::models::{AmountSign, Bank, BankUpdate, NewBank};

/// Request body for creating a bank
#[derive(Debug, Deserialize)]
pub struct CreateBankRequest {
    pub name: String,
    /// Defaults to the user's default currency
    pub currency: Option<String>,
    pub date_format: Option<String>,
    #[serde(default)]
    pub amount_sign: AmountSign,
}

/// Query parameters for deleting a bank
#[derive(Debug, Deserialize)]
pub struct DeleteBankQuery {
    /// Also delete the bank's transactions and imports
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct DeleteBankResponse {
    pub success: bool,
    pub transactions_deleted: usize,
}

/// GET /api/banks - List the user's banks
pub async fn list_banks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Bank>>, AppError> {
    Ok(Json(state.db.list_banks(&user.id)?))
}

/// POST /api/banks - Create a bank
pub async fn create_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateBankRequest>,
) -> Result<Json<Bank>, AppError> {
    let currency = match req.currency {
        Some(c) => c,
        None => {
            state
                .db
                .get_user(&user.id)?
                .ok_or_else(|| AppError::not_found("Profile not found"))?
                .default_currency
        }
    };

    let bank = state.db.create_bank(
        &user.id,
        &NewBank {
            name: req.name,
            currency,
            date_format: req.date_format,
            amount_sign: req.amount_sign,
        },
    )?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("bank"),
        Some(bank.id),
        Some(&format!("name={}, currency={}", bank.name, bank.currency)),
    )?;

    Ok(Json(bank))
}

/// GET /api/banks/:id - Get a single bank
pub async fn get_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Bank>, AppError> {
    let bank = state
        .db
        .get_bank(&user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Bank {} not found", id)))?;
    Ok(Json(bank))
}

/// PATCH /api/banks/:id - Update a bank
pub async fn update_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<BankUpdate>,
) -> Result<Json<Bank>, AppError> {
    let bank = state.db.update_bank(&user.id, id, &update)?;

    state
        .db
        .log_audit(&user.id, "update", Some("bank"), Some(id), None)?;

    Ok(Json(bank))
}

/// DELETE /api/banks/:id - Delete a bank (refused while it has transactions unless ?force=true)
pub async fn delete_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteBankQuery>,
) -> Result<Json<DeleteBankResponse>, AppError> {
    let deleted = state.db.delete_bank(&user.id, id, params.force)?;

    state.db.log_audit(
        &user.id,
        "delete",
        Some("bank"),
        Some(id),
        Some(&format!("force={}, transactions={}", params.force, deleted)),
    )?;

    Ok(Json(DeleteBankResponse {
        success: true,
        transactions_deleted: deleted,
    }))
}
