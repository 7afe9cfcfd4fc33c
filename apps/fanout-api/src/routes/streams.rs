//! Producer ingress for the in-process event stream.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/streams/{stream_name}/records", post(put_records))
}

// ---------------------------------------------------------------------------
// POST /streams/:stream_name/records
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct PutRecordsRequest {
    pub records: Vec<PutRecordEntry>,
}

/// One record. Exactly one of `data` (any JSON) or `data_base64` (opaque
/// bytes) must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PutRecordEntry {
    pub partition_key: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: Option<Value>,
    #[serde(default)]
    pub data_base64: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PutRecordsResponse {
    pub stream_name: String,
    pub sequence_numbers: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/streams/{stream_name}/records",
    tag = "Streams",
    params(("stream_name" = String, Path, description = "Stream name")),
    request_body = PutRecordsRequest,
    responses(
        (status = 200, description = "Records appended", body = PutRecordsResponse),
        (status = 400, description = "Invalid record", body = ApiErrorBody),
        (status = 404, description = "Unknown stream", body = ApiErrorBody),
    ),
)]
pub async fn put_records(
    State(state): State<AppState>,
    Path(stream_name): Path<String>,
    Json(body): Json<PutRecordsRequest>,
) -> Result<Json<PutRecordsResponse>, ApiError> {
    if stream_name != state.stream.name() {
        return Err(ApiError::not_found(format!("Stream {stream_name} does not exist")));
    }
    if body.records.is_empty() {
        return Err(ApiError::bad_request("At least one record is required"));
    }

    // Validate everything before appending anything.
    let mut payloads = Vec::with_capacity(body.records.len());
    for (i, record) in body.records.into_iter().enumerate() {
        let data = match (record.data, record.data_base64) {
            (Some(value), None) => serde_json::to_vec(&value)
                .map_err(|e| ApiError::bad_request(format!("records[{i}].data: {e}")))?,
            (None, Some(encoded)) => BASE64
                .decode(encoded)
                .map_err(|e| ApiError::bad_request(format!("records[{i}].data_base64: {e}")))?,
            _ => {
                return Err(ApiError::bad_request(format!(
                    "records[{i}] must set exactly one of data or data_base64"
                )))
            }
        };
        payloads.push((record.partition_key, data));
    }

    let mut sequence_numbers = Vec::with_capacity(payloads.len());
    for (partition_key, data) in payloads {
        sequence_numbers.push(state.stream.append(&partition_key, data).await?);
    }

    tracing::debug!(stream = %stream_name, records = sequence_numbers.len(), "records appended");

    Ok(Json(PutRecordsResponse {
        stream_name,
        sequence_numbers,
    }))
}
