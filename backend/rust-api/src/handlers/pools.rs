use axum::{
    extract::{Extension, Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    policy::Subject,
    services::{pool_service::PoolService, AppState},
};

pub async fn list_pools(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<impl IntoResponse, ApiError> {
    let service = PoolService::new(state.mongo.clone());
    let pools = service.list_visible_pools(&subject).await?;

    Ok(Json(pools))
}

pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    Path(pool_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = PoolService::new(state.mongo.clone());
    let questions = service.list_visible_questions(&subject, &pool_id).await?;

    Ok(Json(questions))
}
