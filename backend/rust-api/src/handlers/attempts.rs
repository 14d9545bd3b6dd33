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
    models::{AbandonOrigin, StartAttemptRequest, SubmitAnswerRequest},
    policy::Subject,
    services::{attempt_service::AttemptService, AppState},
};

pub async fn start_attempt(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    AppJson(req): AppJson<StartAttemptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("starting attempt on pool {}", req.pool_id);

    let service = AttemptService::new(state.mongo.clone(), state.redis.clone());
    let attempt = service.start_attempt(&subject, &req.pool_id).await?;

    Ok((StatusCode::CREATED, Json(attempt)))
}

pub async fn get_attempt(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AttemptService::new(state.mongo.clone(), state.redis.clone());
    let attempt = service.get_attempt(&subject, &attempt_id).await?;

    Ok(Json(attempt))
}

pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(attempt_id): Path<String>,
    AppJson(req): AppJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AttemptService::new(state.mongo.clone(), state.redis.clone());
    let attempt = service
        .submit_answer(&subject, &attempt_id, &req.question_id)
        .await?;

    Ok(Json(attempt))
}

pub async fn complete_attempt(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AttemptService::new(state.mongo.clone(), state.redis.clone());
    let attempt = service.complete_attempt(&subject, &attempt_id).await?;

    Ok(Json(attempt))
}

pub async fn abandon_attempt(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = AttemptService::new(state.mongo.clone(), state.redis.clone());
    let attempt = service
        .abandon_attempt(&subject, &attempt_id, AbandonOrigin::User)
        .await?;

    Ok(Json(attempt))
}
