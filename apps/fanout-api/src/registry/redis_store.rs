use std::collections::BTreeSet;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{Connection, ConnectionRegistry, RegistryError};

/// Keys fetched per SCAN round trip.
const SCAN_COUNT: usize = 500;

/// Redis-backed registry. Each connection is one key, `{table}:{id}`.
///
/// Expiry uses native key TTLs, so stale entries vanish without the
/// dispatcher ever reading the expiry.
#[derive(Clone)]
pub struct RedisRegistry {
    conn: ConnectionManager,
    table: String,
}

impl RedisRegistry {
    pub async fn connect(redis_url: &str, table: &str) -> Result<Self, RegistryError> {
        let client = redis::Client::open(redis_url).map_err(unavailable)?;
        let conn = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.table, id)
    }
}

/// Escape `s` for use as a literal inside a SCAN `MATCH` pattern.
fn escape_glob(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unavailable(e: redis::RedisError) -> RegistryError {
    tracing::error!(?e, "redis registry error");
    RegistryError::Unavailable(e.to_string())
}

#[async_trait]
impl ConnectionRegistry for RedisRegistry {
    async fn put(&self, connection: &Connection) -> Result<(), RegistryError> {
        let key = self.key(&connection.id);
        let mut conn = self.conn.clone();

        let ttl_secs = connection
            .expires_at
            .map(|at| (at - chrono::Utc::now()).num_seconds().max(1) as u64);
        let connected_at = chrono::Utc::now().to_rfc3339();

        match ttl_secs {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key, connected_at, ttl)
                .await
                .map_err(unavailable),
            None => conn
                .set::<_, _, ()>(&key, connected_at)
                .await
                .map_err(unavailable),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), RegistryError> {
        let key = self.key(id);
        self.conn
            .clone()
            .del::<_, ()>(&key)
            .await
            .map_err(unavailable)
    }

    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        let mut conn = self.conn.clone();
        let prefix = format!("{}:", self.table);
        let pattern = format!("{}*", escape_glob(&prefix));

        // SCAN may yield a key more than once; the set dedupes.
        let mut ids = BTreeSet::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(unavailable)?;

            ids.extend(
                keys.iter()
                    .filter_map(|k| k.strip_prefix(&prefix))
                    .map(str::to_string),
            );

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(ids.into_iter().collect())
    }
}
