//! Categorization handlers: cascade reruns and AI suggestions

use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT};
use tally_core::ai::{self, SuggestOptions, SuggestResult};
use tally_core::categorize::{self, RecategorizeResult, RecategorizeScope};

/// Request body for a cascade rerun
#[derive(Debug, Default, Deserialize)]
pub struct RecategorizeRequest {
    /// all, uncategorized or import
    #[serde(default = "default_scope")]
    pub scope: String,
    pub import_id: Option<i64>,
}

fn default_scope() -> String {
    "all".to_string()
}

/// Request body for AI suggestions
#[derive(Debug, Deserialize)]
pub struct SuggestRequest {
    pub limit: Option<i64>,
    #[serde(default)]
    pub apply: bool,
    pub min_confidence: Option<f64>,
}

/// POST /api/categorize - Re-run the keyword/rule cascade
///
/// Manual assignments are never touched.
pub async fn recategorize(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RecategorizeRequest>,
) -> Result<Json<RecategorizeResult>, AppError> {
    let scope = RecategorizeScope::parse(&req.scope, req.import_id)?;
    let result = categorize::recategorize(&state.db, &user.id, scope)?;

    state.db.log_audit(
        &user.id,
        "recategorize",
        Some("transaction"),
        req.import_id,
        Some(&format!("scope={}, changed={}", req.scope, result.changed)),
    )?;

    Ok(Json(result))
}

/// POST /api/categorize/suggest - Ask the AI for categories of uncategorized transactions
///
/// Returns 400 when no suggester is configured.
pub async fn suggest_categories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<SuggestRequest>,
) -> Result<Json<SuggestResult>, AppError> {
    let suggester = state.suggester.as_ref().ok_or_else(|| {
        AppError::bad_request("AI suggestions are not configured (set ANTHROPIC_API_KEY)")
    })?;

    let defaults = SuggestOptions::default();
    let min_confidence = req.min_confidence.unwrap_or(defaults.min_confidence);
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(AppError::bad_request("min_confidence must be between 0 and 1"));
    }
    let opts = SuggestOptions {
        limit: req.limit.unwrap_or(defaults.limit).clamp(1, MAX_PAGE_LIMIT),
        apply: req.apply,
        min_confidence,
    };

    let result = ai::suggest_categories(&state.db, suggester.as_ref(), &user.id, opts).await?;

    if opts.apply {
        state.db.log_audit(
            &user.id,
            "suggest",
            Some("transaction"),
            None,
            Some(&format!("applied={}", result.applied)),
        )?;
    }

    Ok(Json(result))
}
