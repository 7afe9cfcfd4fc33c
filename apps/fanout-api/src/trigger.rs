//! Invocation triggers and their classification.
//!
//! A trigger arrives as an untyped JSON envelope. It is classified once, by
//! structure alone, into a [`Trigger`]; nothing downstream looks at the raw
//! envelope again.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// A classified invocation trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    Lifecycle(LifecycleNotification),
    Stream(StreamBatch),
    /// Neither shape matched. Acknowledged without action.
    Unrecognized,
}

/// What the gateway reports happened to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Connect,
    Disconnect,
    /// A client frame on the default route.
    Message,
    Other(String),
}

impl LifecycleEvent {
    fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "CONNECT" => Self::Connect,
            "DISCONNECT" => Self::Disconnect,
            "MESSAGE" => Self::Message,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleNotification {
    pub connection_id: String,
    pub event: LifecycleEvent,
}

/// Records delivered together in one invocation, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamBatch {
    pub records: Vec<StreamRecord>,
}

/// Payload bytes as they arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    Raw(Vec<u8>),
    /// Base64 text from a platform envelope; decoded per record so one bad
    /// record cannot sink the batch.
    Base64(String),
}

impl RecordData {
    pub fn bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::Base64(text) => BASE64.decode(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    /// Producer-assigned; carried for logging only.
    pub partition_key: String,
    pub sequence_number: String,
    pub arrival: Option<DateTime<Utc>>,
    pub data: RecordData,
}

// ---------------------------------------------------------------------------
// Envelope shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LifecycleEnvelope {
    request_context: RequestContext,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestContext {
    connection_id: String,
    #[serde(default)]
    event_type: String,
}

#[derive(Deserialize)]
struct StreamEnvelope {
    #[serde(rename = "Records")]
    records: Vec<StreamEnvelopeRecord>,
}

#[derive(Deserialize)]
struct StreamEnvelopeRecord {
    kinesis: KinesisRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KinesisRecord {
    data: String,
    #[serde(default)]
    partition_key: String,
    #[serde(default)]
    sequence_number: String,
    /// Seconds since the Unix epoch, fractional.
    #[serde(default)]
    approximate_arrival_timestamp: Option<f64>,
}

impl From<KinesisRecord> for StreamRecord {
    fn from(r: KinesisRecord) -> Self {
        Self {
            partition_key: r.partition_key,
            sequence_number: r.sequence_number,
            arrival: r
                .approximate_arrival_timestamp
                .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64)),
            data: RecordData::Base64(r.data),
        }
    }
}

impl Trigger {
    pub fn lifecycle(connection_id: &str, event: LifecycleEvent) -> Self {
        Self::Lifecycle(LifecycleNotification {
            connection_id: connection_id.to_string(),
            event,
        })
    }

    /// Classify a raw envelope.
    ///
    /// A `requestContext` object marks a lifecycle notification; a `Records`
    /// array whose first element carries `kinesis` marks a stream batch.
    /// Envelopes of a recognized shape with missing fields are unrecognized.
    pub fn classify(envelope: Value) -> Self {
        if envelope.get("requestContext").is_some_and(Value::is_object) {
            return match serde_json::from_value::<LifecycleEnvelope>(envelope) {
                Ok(env) => Self::lifecycle(
                    &env.request_context.connection_id,
                    LifecycleEvent::from_event_type(&env.request_context.event_type),
                ),
                Err(e) => {
                    tracing::warn!(error = %e, "lifecycle envelope missing fields");
                    Self::Unrecognized
                }
            };
        }

        let is_stream = envelope
            .get("Records")
            .and_then(|r| r.get(0))
            .is_some_and(|first| first.get("kinesis").is_some());
        if is_stream {
            return match serde_json::from_value::<StreamEnvelope>(envelope) {
                Ok(env) => Self::Stream(StreamBatch {
                    records: env.records.into_iter().map(|r| r.kinesis.into()).collect(),
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "stream envelope missing fields");
                    Self::Unrecognized
                }
            };
        }

        Self::Unrecognized
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Lifecycle(_) => "lifecycle",
            Self::Stream(_) => "stream",
            Self::Unrecognized => "unrecognized",
        }
    }
}
