//! Category handlers
//!
//! Users see global categories plus their own. Global categories can only be
//! created or changed by the service role.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, AuthUser};
use tally_core::models::{Category, CategoryKind, CategoryUpdate, NewCategory};

/// Request body for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub kind: CategoryKind,
    pub color: Option<String>,
    /// Create a global category (admin only)
    #[serde(default)]
    pub global: bool,
}

#[derive(Serialize)]
pub struct DeleteCategoryResponse {
    pub success: bool,
    /// Transactions returned to uncategorized
    pub transactions_uncategorized: usize,
}

/// GET /api/categories - List global and user categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.list_categories(&user.id)?))
}

/// POST /api/categories - Create a category
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    let owner = if req.global {
        user.require_admin()?;
        None
    } else {
        Some(user.id.as_str())
    };

    let category = state.db.create_category(
        owner,
        &NewCategory {
            name: req.name,
            kind: req.kind,
            color: req.color,
        },
    )?;

    state.db.log_audit(
        &user.id,
        "create",
        Some("category"),
        Some(category.id),
        Some(&format!("name={}, global={}", category.name, req.global)),
    )?;

    Ok(Json(category))
}

/// GET /api/categories/:id - Get a visible category
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, AppError> {
    Ok(Json(state.db.get_visible_category(&user.id, id)?))
}

/// PATCH /api/categories/:id - Update a category
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(update): Json<CategoryUpdate>,
) -> Result<Json<Category>, AppError> {
    let category = state
        .db
        .update_category(&user.id, user.admin, id, &update)?;

    state
        .db
        .log_audit(&user.id, "update", Some("category"), Some(id), None)?;

    Ok(Json(category))
}

/// DELETE /api/categories/:id - Delete a category
///
/// Its transactions become uncategorized; keywords and rules pointing at it
/// are removed.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteCategoryResponse>, AppError> {
    let cleared = state.db.delete_category(&user.id, user.admin, id)?;

    state.db.log_audit(
        &user.id,
        "delete",
        Some("category"),
        Some(id),
        Some(&format!("uncategorized={}", cleared)),
    )?;

    Ok(Json(DeleteCategoryResponse {
        success: true,
        transactions_uncategorized: cleared,
    }))
}
