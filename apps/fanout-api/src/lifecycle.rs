//! Connect/disconnect notifications → registry writes.

use std::sync::Arc;
use std::time::Duration;

use crate::registry::{Connection, ConnectionRegistry, RegistryError};
use crate::trigger::{LifecycleEvent, LifecycleNotification};

/// Holds no per-connection state; the registry is the only record.
pub struct LifecycleHandler {
    registry: Arc<dyn ConnectionRegistry>,
    connection_ttl: Duration,
}

impl LifecycleHandler {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, connection_ttl: Duration) -> Self {
        Self {
            registry,
            connection_ttl,
        }
    }

    /// Apply one notification. Only a registry failure is an error; unknown
    /// ids and unrelated event types are acknowledged.
    pub async fn handle(&self, notification: &LifecycleNotification) -> Result<(), RegistryError> {
        let connection_id = notification.connection_id.as_str();

        match &notification.event {
            LifecycleEvent::Connect => {
                let connection = Connection::new(connection_id).with_ttl(self.connection_ttl);
                self.registry.put(&connection).await?;
                tracing::info!(%connection_id, "connection registered");
            }
            LifecycleEvent::Disconnect => {
                self.registry.delete(connection_id).await?;
                tracing::info!(%connection_id, "connection removed");
            }
            LifecycleEvent::Message => {
                tracing::debug!(%connection_id, "client message ignored");
            }
            LifecycleEvent::Other(event_type) => {
                tracing::debug!(%connection_id, %event_type, "lifecycle event ignored");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    fn notification(id: &str, event: LifecycleEvent) -> LifecycleNotification {
        LifecycleNotification {
            connection_id: id.to_string(),
            event,
        }
    }

    fn handler() -> (LifecycleHandler, Arc<MemoryRegistry>) {
        let registry = Arc::new(MemoryRegistry::new());
        let handler = LifecycleHandler::new(registry.clone(), Duration::from_secs(60));
        (handler, registry)
    }

    #[tokio::test]
    async fn connect_twice_registers_once() {
        let (handler, registry) = handler();
        let connect = notification("a", LifecycleEvent::Connect);

        handler.handle(&connect).await.unwrap();
        handler.handle(&connect).await.unwrap();

        assert_eq!(registry.list_all().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn disconnect_of_unknown_id_is_noop() {
        let registry = Arc::new(MemoryRegistry::with_ids(["a"]));
        let handler = LifecycleHandler::new(registry.clone(), Duration::ZERO);

        handler
            .handle(&notification("ghost", LifecycleEvent::Disconnect))
            .await
            .unwrap();

        assert_eq!(registry.list_all().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn registry_converges_to_unmatched_connects() {
        let (handler, registry) = handler();
        let sequence = [
            ("a", LifecycleEvent::Connect),
            ("b", LifecycleEvent::Connect),
            ("c", LifecycleEvent::Connect),
            ("b", LifecycleEvent::Disconnect),
            ("d", LifecycleEvent::Disconnect),
            ("c", LifecycleEvent::Message),
            ("a", LifecycleEvent::Disconnect),
            ("a", LifecycleEvent::Connect),
        ];
        for (id, event) in sequence {
            handler.handle(&notification(id, event)).await.unwrap();
        }

        assert_eq!(
            registry.list_all().await.unwrap(),
            vec!["a".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn other_event_types_leave_registry_untouched() {
        let (handler, registry) = handler();
        handler
            .handle(&notification("a", LifecycleEvent::Other("PING".into())))
            .await
            .unwrap();
        assert!(registry.is_empty());
    }
}
