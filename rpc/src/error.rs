//! RPC error types.

use accrue_ledger::{GatewayError, LedgerError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request {0} is already being processed")]
    RequestInFlight(String),

    #[error("action disabled: {0}")]
    Disabled(&'static str),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("token error: {0}")]
    Token(#[from] GatewayError),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    /// Machine-readable kind sent alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::InvalidRequest(_) => "invalid_request",
            RpcError::RequestInFlight(_) => "request_in_flight",
            RpcError::Disabled(_) => "disabled",
            RpcError::Ledger(e) => e.kind(),
            RpcError::Token(_) => "token_error",
            RpcError::Server(_) => "server_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::RequestInFlight(_) => StatusCode::CONFLICT,
            RpcError::Disabled(_) => StatusCode::FORBIDDEN,
            RpcError::Ledger(LedgerError::TaskFailed(_)) | RpcError::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            // Rejections by the ledger or token are ordinary RPC results.
            RpcError::Ledger(_) | RpcError::Token(_) => StatusCode::OK,
        }
    }
}

impl From<accrue_types::AmountError> for RpcError {
    fn from(e: accrue_types::AmountError) -> Self {
        RpcError::InvalidRequest(format!("bad amount: {e}"))
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (self.status(), Json(body)).into_response()
    }
}
