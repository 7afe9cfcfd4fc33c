//! Push side of the connection gateway.
//!
//! The dispatcher only sees [`PushGateway`]; whether connections live in this
//! process ([`LocalGateway`]) or behind a remote management endpoint
//! ([`HttpGateway`]) is decided once at startup.

pub mod remote;
pub mod local;

use async_trait::async_trait;

pub use self::remote::HttpGateway;
pub use self::local::LocalGateway;

/// Why a push to one connection failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The gateway reports the connection as permanently gone (HTTP 410).
    /// The only signal that allows pruning a registry entry.
    #[error("connection {0} is gone")]
    StaleTarget(String),
    /// Anything else. Logged and skipped for this event only.
    #[error("push to {connection_id} failed: {reason}")]
    Transient {
        connection_id: String,
        reason: String,
    },
}

impl PushError {
    pub fn transient(connection_id: &str, reason: impl Into<String>) -> Self {
        Self::Transient {
            connection_id: connection_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleTarget(_))
    }
}

/// Errors building a gateway client at startup.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid gateway endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// "Post to connection" primitive.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError>;
}
