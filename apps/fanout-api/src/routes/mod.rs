pub mod health;
pub mod invoke;
pub mod streams;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(invoke::router())
        .merge(streams::router())
        .merge(crate::gateway::local::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        invoke::invoke,
        streams::put_records,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            health::HealthResponse,
            invoke::InvokeResponse,
            streams::PutRecordsRequest,
            streams::PutRecordEntry,
            streams::PutRecordsResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Invoke", description = "Lifecycle and stream triggers"),
        (name = "Streams", description = "Event stream ingress"),
    )
)]
pub struct ApiDoc;
