use axum::{
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    models::{account::BalanceResponse, account::PurchaseRequest, LedgerReason},
    policy::Subject,
    services::{ledger_service::LedgerService, AppState},
};

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;

    let service = LedgerService::new(state.mongo.clone(), state.redis.clone());
    let balance = service.cached_balance(user_id).await?;

    Ok(Json(BalanceResponse { balance }))
}

/// Consumes a "credits purchased" event from the payment processor. The
/// checkout flow itself lives elsewhere; redeliveries of the same payment id
/// are absorbed by ledger idempotency.
pub async fn record_purchase(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<Subject>,
    AppJson(req): AppJson<PurchaseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = subject.user_id().ok_or(ApiError::NotAuthorized)?;
    if req.amount <= 0 {
        return Err(ApiError::OutOfRange("purchase amount must be positive"));
    }

    let service = LedgerService::new(state.mongo.clone(), state.redis.clone());
    let balance = service
        .credit(
            user_id,
            req.amount,
            LedgerReason::Purchase,
            &format!("purchase:{}", req.payment_id),
            None,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(BalanceResponse { balance })))
}
