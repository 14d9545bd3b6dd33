use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Kernel error taxonomy. Every fallible kernel operation reports one of
/// these; nothing is swallowed and nothing is retried below the transaction
/// boundary (see `utils::retry` for how `Conflict` is handled around whole
/// operations).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Balance too low for the requested debit. The caller must top up;
    /// retrying without doing so cannot succeed.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// The attempt or report is not in a state that permits the requested
    /// transition. From a well-behaved client this indicates a race.
    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    #[error("out of range: {0}")]
    OutOfRange(&'static str),

    /// Also covers visibility denials: a resource the caller may not see is
    /// reported exactly like a resource that does not exist.
    #[error("not found")]
    NotFound,

    #[error("not authorized")]
    NotAuthorized,

    /// A concurrent writer interfered mid-operation. Retried as a whole
    /// operation by the caller, surfaced only when retries run out.
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Storage(#[from] mongodb::error::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
            ApiError::InvalidTransition(_) => StatusCode::CONFLICT,
            ApiError::OutOfRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::NotAuthorized => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal details stay in the logs, not in the response body.
        let message = match &self {
            ApiError::Storage(e) => {
                tracing::error!("storage error: {:#}", e);
                "internal error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!("internal error: {:#}", e);
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "error": message,
                "status": status.as_u16(),
            })),
        )
            .into_response()
    }
}
