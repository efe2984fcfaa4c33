//! Statement upload and import history handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, AuthUser, MAX_PAGE_LIMIT, MAX_UPLOAD_SIZE};
use tally_core::db::ImportDetails;
use tally_core::import::DateOrder;
use tally_core::ingest::{ingest_statement, ImportOutcome, IngestOptions};
use tally_core::models::ImportRecord;

/// Query parameters for import history
#[derive(Debug, Deserialize)]
pub struct ImportListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct DeleteImportResponse {
    pub success: bool,
    pub transactions_deleted: usize,
}

fn parse_bool_field(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(AppError::bad_request(&format!(
            "Invalid {}: {}",
            name, value
        ))),
    }
}

/// POST /api/import - Import a bank statement
///
/// Expects multipart form with:
/// - file: CSV, Excel or PDF statement (required, max 10MB)
/// - bank_id: Bank to import into (required)
/// - categorize: run the keyword/rule cascade (optional, default true)
/// - date_order: month_first or day_first for ambiguous dates (optional)
pub async fn import_statement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<Json<ImportOutcome>, AppError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut bank_id: Option<i64> = None;
    let mut opts = IngestOptions::default();

    // Extract fields from multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(&format!("Failed to read form field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(String::from);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read file data"))?;

                // Check file size limit
                if bytes.len() > MAX_UPLOAD_SIZE {
                    return Err(AppError::bad_request(&format!(
                        "File too large. Maximum size is {} MB",
                        MAX_UPLOAD_SIZE / 1024 / 1024
                    )));
                }

                file_data = Some(bytes.to_vec());
            }
            "bank_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read bank_id"))?;
                bank_id = Some(value.trim().parse().map_err(|_| {
                    AppError::bad_request(&format!("Invalid bank_id: {}", value))
                })?);
            }
            "categorize" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read categorize"))?;
                opts.categorize = parse_bool_field("categorize", &value)?;
            }
            "date_order" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| AppError::bad_request("Failed to read date_order"))?;
                opts.ambiguous_dates = value
                    .parse::<DateOrder>()
                    .map_err(|e| AppError::bad_request(&e))?;
            }
            _ => {}
        }
    }

    // Validate required fields
    let file_data = file_data.ok_or_else(|| AppError::bad_request("Missing file field"))?;
    let bank_id = bank_id.ok_or_else(|| AppError::bad_request("Missing bank_id field"))?;
    if file_data.is_empty() {
        return Err(AppError::bad_request("Uploaded file is empty"));
    }

    let bank = state
        .db
        .get_bank(&user.id, bank_id)?
        .ok_or_else(|| AppError::not_found(&format!("Bank {} not found", bank_id)))?;

    info!(
        user = %user.id,
        bank_id,
        filename = filename.as_deref().unwrap_or("-"),
        size = file_data.len(),
        "Importing statement"
    );

    // Parsing (PDF especially) is CPU-bound; keep it off the async workers
    let db = state.db.clone();
    let user_id = user.id.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        ingest_statement(&db, &user_id, &bank, filename.as_deref(), &file_data, opts)
    })
    .await??;

    Ok(Json(outcome))
}

/// GET /api/imports - List recent imports
pub async fn list_imports(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ImportListQuery>,
) -> Result<Json<Vec<ImportRecord>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db.list_imports(&user.id, limit)?))
}

/// GET /api/imports/:id - Get an import with its skipped rows
pub async fn get_import(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<ImportDetails>, AppError> {
    let details = state
        .db
        .get_import_details(&user.id, id)?
        .ok_or_else(|| AppError::not_found(&format!("Import {} not found", id)))?;
    Ok(Json(details))
}

/// DELETE /api/imports/:id - Delete an import and its transactions
pub async fn delete_import(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteImportResponse>, AppError> {
    let removed = state.db.delete_import(&user.id, id)?;

    state.db.log_audit(
        &user.id,
        "delete",
        Some("import"),
        Some(id),
        Some(&format!("transactions={}", removed)),
    )?;

    Ok(Json(DeleteImportResponse {
        success: true,
        transactions_deleted: removed,
    }))
}
