use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{Connection, ConnectionRegistry, RegistryError};

/// In-process registry for local runs and tests.
///
/// Expired entries are evicted lazily when the registry is listed, matching
/// the passive expiry of the Redis backend.
pub struct MemoryRegistry {
    entries: Mutex<BTreeMap<String, Option<DateTime<Utc>>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Seed the registry with ids that never expire.
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = ids.into_iter().map(|id| (id.into(), None)).collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionRegistry for MemoryRegistry {
    async fn put(&self, connection: &Connection) -> Result<(), RegistryError> {
        self.entries
            .lock()
            .insert(connection.id.clone(), connection.expires_at);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        self.entries.lock().remove(id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, expires_at| expires_at.map_or(true, |at| at > now));
        Ok(entries.keys().cloned().collect())
    }
}
