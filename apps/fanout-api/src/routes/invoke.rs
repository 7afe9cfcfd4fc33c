//! Platform invocation endpoint: one trigger envelope per request.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/invoke", post(invoke))
}

/// Acknowledgement returned for every handled or ignored trigger.
#[derive(Debug, Serialize, ToSchema)]
pub struct InvokeResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

#[utoipa::path(
    post,
    path = "/invoke",
    tag = "Invoke",
    request_body(content = Object, description = "Lifecycle notification or stream batch envelope"),
    responses(
        (status = 200, description = "Trigger handled or ignored", body = InvokeResponse),
        (status = 503, description = "Connection registry unavailable", body = ApiErrorBody),
        (status = 504, description = "Invocation deadline exceeded", body = ApiErrorBody),
    ),
)]
pub async fn invoke(
    State(state): State<AppState>,
    Json(envelope): Json<Value>,
) -> Result<Json<InvokeResponse>, ApiError> {
    state.entry.route_envelope(envelope).await?;
    Ok(Json(InvokeResponse { status_code: 200 }))
}
