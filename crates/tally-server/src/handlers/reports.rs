//! Report handlers
//!
//! All reports take the same query parameters:
//! - from, to: inclusive YYYY-MM-DD range (default: the last 12 months)
//! - bank_id: restrict to one bank
//! - currency: report currency (default: the bank's, else the user's)

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::{AppError, AppState, AuthUser};
use tally_core::db::default_report_range;
use tally_core::models::{BankBreakdown, CategoryBreakdown, PivotTable, ReportFilter, ReportSummary};

/// Query parameters shared by all reports
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub bank_id: Option<i64>,
    pub currency: Option<String>,
}

/// Parse a YYYY-MM-DD query parameter
pub fn parse_date_param(value: &str, name: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::bad_request(&format!("Invalid {} date format (use YYYY-MM-DD)", name))
    })
}

fn resolve_filter(
    state: &AppState,
    user: &AuthUser,
    params: &ReportQuery,
) -> Result<ReportFilter, AppError> {
    let (default_from, default_to) = default_report_range(Utc::now().date_naive());
    let from = match params.from.as_deref() {
        Some(s) => parse_date_param(s, "from")?,
        None => default_from,
    };
    let to = match params.to.as_deref() {
        Some(s) => parse_date_param(s, "to")?,
        None => default_to,
    };

    Ok(state.db.report_filter(
        &user.id,
        from,
        to,
        params.bank_id,
        params.currency.as_deref(),
    )?)
}

/// GET /api/reports/pivot - Category × month table of signed sums
pub async fn report_pivot(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<PivotTable>, AppError> {
    let filter = resolve_filter(&state, &user, &params)?;
    Ok(Json(state.db.pivot_table(&filter)?))
}

/// GET /api/reports/by-category - Outflow per category
pub async fn report_by_category(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<Vec<CategoryBreakdown>>, AppError> {
    let filter = resolve_filter(&state, &user, &params)?;
    Ok(Json(state.db.spending_by_category(&filter)?))
}

/// GET /api/reports/by-bank - Inflow and outflow per bank
pub async fn report_by_bank(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<Vec<BankBreakdown>>, AppError> {
    let filter = resolve_filter(&state, &user, &params)?;
    Ok(Json(state.db.breakdown_by_bank(&filter)?))
}

/// GET /api/reports/summary - Income, expenses and savings rate
pub async fn report_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<ReportSummary>, AppError> {
    let filter = resolve_filter(&state, &user, &params)?;
    Ok(Json(state.db.summary(&filter)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_param() {
        assert!(parse_date_param("2024-02-29", "from").is_ok());
        let err = parse_date_param("02/29/2024", "from").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
