//! Route handlers

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use super::server::AppState;

/// Relay any request under the mount path through the gateway
pub async fn proxy(State(state): State<AppState>, request: Request) -> Response {
    state.handler.handle(request.into()).await
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
