use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use types::errors::LedgerError;

/// Central error type for the Gateway application
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        LedgerError::InsufficientFunds { .. }
        | LedgerError::InsufficientHoldings { .. }
        | LedgerError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        LedgerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            AppError::Ledger(err) => {
                let status = ledger_status(&err);
                if status.is_server_error() {
                    error!(error = %err, "Ledger operation failed");
                }
                (status, err.to_string(), err.code())
            }
            AppError::InternalError(err) => {
                error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": code,
            "message": error_message
        }));

        (status, body).into_response()
    }
}
