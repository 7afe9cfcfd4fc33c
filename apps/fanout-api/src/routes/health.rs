use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub stream: String,
    /// Sockets open on this process; absent when a remote gateway is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_connections: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        stream: state.stream.name().to_string(),
        local_connections: state.local_gateway.as_ref().map(|gw| gw.connection_count()),
    })
}
