//! Currency handlers
//!
//! The currency table is shared; only the service role may change it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, SuccessResponse};
use tally_core::models::Currency;

/// Request body for adding a currency
#[derive(Debug, Deserialize)]
pub struct CreateCurrencyRequest {
    pub code: String,
    pub name: String,
    pub symbol: Option<String>,
}

/// GET /api/currencies - List known currencies
pub async fn list_currencies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Currency>>, AppError> {
    Ok(Json(state.db.list_currencies()?))
}

/// POST /api/currencies - Add a currency (admin)
pub async fn create_currency(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateCurrencyRequest>,
) -> Result<Json<Currency>, AppError> {
    user.require_admin()?;

    let currency = state
        .db
        .create_currency(&req.code, &req.name, req.symbol.as_deref())?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("currency"),
        None,
        Some(&currency.code),
    )?;

    Ok(Json(currency))
}

/// DELETE /api/currencies/:code - Remove an unused currency (admin)
pub async fn delete_currency(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(code): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    user.require_admin()?;

    state.db.delete_currency(&code)?;

    state
        .db
        .log_audit(&user.id, "delete", Some("currency"), None, Some(&code))?;

    Ok(Json(SuccessResponse { success: true }))
}
