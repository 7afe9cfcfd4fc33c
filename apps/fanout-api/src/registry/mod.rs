//! Durable registry of connection ids currently believed to be reachable.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use self::memory::MemoryRegistry;
pub use self::redis_store::RedisRegistry;

/// Raised when the backing store cannot be reached.
///
/// Never retried here: every registry operation is idempotent, so the caller
/// aborts the invocation and the platform redelivers the whole trigger.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: String,
    /// Passive expiry hint honoured by the store, never read by the dispatcher.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Connection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            expires_at: None,
        }
    }

    /// Attach an expiry `ttl` from now. A zero TTL means no expiry.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        if !ttl.is_zero() {
            self.expires_at = chrono::Duration::from_std(ttl)
                .ok()
                .map(|ttl| Utc::now() + ttl);
        }
        self
    }
}

/// Store of live connection ids.
///
/// Implementations never cache: each call is a round trip to the store.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Insert or refresh an entry. Inserting an existing id is not an error.
    async fn put(&self, connection: &Connection) -> Result<(), RegistryError>;

    /// Remove an entry. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), RegistryError>;

    /// Every id currently stored, without duplicates.
    ///
    /// Entries added or removed while the listing runs may or may not appear.
    async fn list_all(&self) -> Result<Vec<String>, RegistryError>;
}
