//! Profile handlers

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{AppError, AppState, AuthUser};
use tally_core::models::{UserProfile, UserUpdate};

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub admin: bool,
    /// How the user was authenticated
    pub auth_method: &'static str,
}

/// GET /api/me - The authenticated user's profile
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>, AppError> {
    let profile = state
        .db
        .get_user(&user.id)?
        .ok_or_else(|| AppError::not_found("Profile not found"))?;

    Ok(Json(MeResponse {
        profile,
        admin: user.admin,
        auth_method: user.method,
    }))
}

/// PATCH /api/me - Update display name or default currency
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<MeResponse>, AppError> {
    let profile = state.db.update_user(&user.id, &update)?;

    state
        .db
        .log_audit(&user.id, "update", Some("profile"), None, None)?;

    Ok(Json(MeResponse {
        profile,
        admin: user.admin,
        auth_method: user.method,
    }))
}
