use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::ApiError,
    extractors::AppJson,
    models::{
        account::BalanceResponse, account::GrantCreditsRequest, report::ListReportsQuery,
        report::ReviewReportRequest, LedgerReason,
    },
    policy::Subject,
    services::{ledger_service::LedgerService, report_service::ReportService, AppState},
};

pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Query(query): Query<ListReportsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ReportService::new(state.mongo.clone());
    let reports = service.list_reports(&subject, query.status).await?;

    Ok(Json(reports))
}

pub async fn review_report(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(report_id): Path<String>,
    AppJson(req): AppJson<ReviewReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ReportService::new(state.mongo.clone());
    let report = service
        .review_report(&subject, &report_id, req.status, req.notes.as_deref())
        .await?;

    Ok(Json(report))
}

/// Manual credit grant (support compensation, promos). Callers may pass
/// their own reference id to make the grant replay-safe across retries.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    AppJson(req): AppJson<GrantCreditsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !subject.is_admin() {
        return Err(ApiError::NotAuthorized);
    }
    if req.amount <= 0 {
        return Err(ApiError::OutOfRange("grant amount must be positive"));
    }

    let reference = req
        .reference_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let service = LedgerService::new(state.mongo.clone(), state.redis.clone());
    let balance = service
        .credit(
            &req.user_id,
            req.amount,
            LedgerReason::Grant,
            &format!("grant:{}", reference),
            req.note.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(BalanceResponse { balance })))
}
