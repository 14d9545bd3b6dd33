use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    models::report::FileReportRequest,
    policy::Subject,
    services::{report_service::ReportService, AppState},
};

pub async fn file_report(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    AppJson(req): AppJson<FileReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ReportService::new(state.mongo.clone());
    let report = service
        .file_report(&subject, &req.question_id, &req.reason)
        .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ReportService::new(state.mongo.clone());
    let report = service.get_report(&subject, &report_id).await?;

    Ok(Json(report))
}
