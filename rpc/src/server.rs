//! Axum-based RPC server.
//!
//! `POST /` takes a JSON object with an `action` field and answers with
//! `{"result": ...}` or `{"error": "...", "kind": "..."}`. `GET /health`
//! answers `ok`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use accrue_ledger::Clock;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::handlers::{dispatch, RpcRequest, RpcState};

/// Build the router. Exposed separately from [`RpcServer`] so it can be
/// driven without a socket.
pub fn router<C: Clock>(state: Arc<RpcState<C>>) -> Router {
    Router::new()
        .route("/", post(handle_rpc::<C>))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn handle_rpc<C: Clock>(State(state): State<Arc<RpcState<C>>>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return RpcError::InvalidRequest(e.to_string()).into_response(),
    };
    let action = request.action();
    match dispatch(&state, request).await {
        Ok(result) => Json(serde_json::json!({ "result": result })).into_response(),
        Err(e) => {
            warn!(action, kind = e.kind(), error = %e, "rpc request failed");
            e.into_response()
        }
    }
}

pub struct RpcServer<C> {
    pub addr: SocketAddr,
    state: Arc<RpcState<C>>,
}

impl<C: Clock> RpcServer<C> {
    pub fn new(addr: SocketAddr, state: Arc<RpcState<C>>) -> Self {
        Self { addr, state }
    }

    /// Serve until `shutdown` resolves.
    pub async fn start<F>(self, shutdown: F) -> Result<(), RpcError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = router(Arc::clone(&self.state));
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| RpcError::Server(format!("bind {}: {e}", self.addr)))?;
        info!(addr = %self.addr, "RPC server listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| RpcError::Server(e.to_string()))?;
        info!("RPC server stopped");
        Ok(())
    }
}
