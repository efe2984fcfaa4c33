//! User keyword handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, SuccessResponse};
use tally_core::models::{UserKeyword, UserKeywordWithCategory};

/// Request body for creating a keyword
#[derive(Debug, Deserialize)]
pub struct CreateKeywordRequest {
    pub keyword: String,
    pub category_id: i64,
}

/// GET /api/keywords - List the user's keywords
pub async fn list_keywords(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<UserKeywordWithCategory>>, AppError> {
    Ok(Json(state.db.list_keywords_with_category(&user.id)?))
}

/// POST /api/keywords - Create a keyword
pub async fn create_keyword(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateKeywordRequest>,
) -> Result<Json<UserKeyword>, AppError> {
    let keyword = state
        .db
        .create_keyword(&user.id, &req.keyword, req.category_id)?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("keyword"),
        Some(keyword.id),
        Some(&format!("keyword={}, category_id={}", keyword.keyword, keyword.category_id)),
    )?;

    Ok(Json(keyword))
}

/// DELETE /api/keywords/:id - Delete a keyword
pub async fn delete_keyword(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.db.delete_keyword(&user.id, id)?;

    state
        .db
        .log_audit(&user.id, "delete", Some("keyword"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}
