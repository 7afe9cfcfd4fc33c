pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod registry;
pub mod routes;
pub mod stream;
pub mod trigger;

use std::sync::Arc;
use std::time::Duration;

use config::Config;
use dispatcher::Dispatcher;
use entry::EntryRouter;
use gateway::{GatewayError, HttpGateway, LocalGateway, PushGateway};
use lifecycle::LifecycleHandler;
use registry::{ConnectionRegistry, MemoryRegistry, RedisRegistry, RegistryError};
use stream::{EventStream, StreamConsumer};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub entry: Arc<EntryRouter>,
    pub stream: EventStream,
    /// Present when connections are hosted in this process.
    pub local_gateway: Option<Arc<LocalGateway>>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Other instances sharing the table would see their sockets pruned by
    /// this one, which only hosts its own.
    #[error("REDIS_URL requires API_GATEWAY_ENDPOINT; in-process sockets cannot share a registry")]
    SharedRegistryWithLocalGateway,
}

/// Store and gateway handles, built once before anything is dispatched.
pub struct Backends {
    pub registry: Arc<dyn ConnectionRegistry>,
    pub gateway: Arc<dyn PushGateway>,
    pub local_gateway: Option<Arc<LocalGateway>>,
}

impl Backends {
    /// Redis when `REDIS_URL` is set, otherwise memory; the remote gateway
    /// when `API_GATEWAY_ENDPOINT` is set, otherwise in-process sockets.
    ///
    /// A Redis registry is only accepted together with the remote gateway.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        if config.redis_url.is_some() && config.gateway_endpoint.is_none() {
            return Err(StartupError::SharedRegistryWithLocalGateway);
        }

        let registry: Arc<dyn ConnectionRegistry> = match &config.redis_url {
            Some(url) => Arc::new(RedisRegistry::connect(url, &config.connection_table).await?),
            None => Arc::new(MemoryRegistry::new()),
        };

        let backends = match &config.gateway_endpoint {
            Some(endpoint) => Self {
                registry,
                gateway: Arc::new(HttpGateway::new(endpoint, config.gateway_timeout)?),
                local_gateway: None,
            },
            None => Self::local(registry),
        };
        Ok(backends)
    }

    /// Any registry paired with the in-process gateway.
    ///
    /// The registry must not be shared with another instance: every id this
    /// gateway does not host is reported gone and pruned.
    pub fn local(registry: Arc<dyn ConnectionRegistry>) -> Self {
        let local = Arc::new(LocalGateway::new());
        Self {
            registry,
            gateway: local.clone(),
            local_gateway: Some(local),
        }
    }
}

impl AppState {
    /// Wire the entry router and event stream. The returned consumer must be
    /// spawned for appended records to be broadcast.
    pub fn new(config: Config, backends: Backends) -> (Self, StreamConsumer) {
        let lifecycle = LifecycleHandler::new(
            backends.registry.clone(),
            Duration::from_secs(config.connection_ttl_secs),
        );
        let dispatcher = Dispatcher::new(
            backends.registry,
            backends.gateway,
            config.push_concurrency,
        );
        let entry = Arc::new(EntryRouter::new(
            lifecycle,
            dispatcher,
            config.invocation_timeout,
        ));

        let (stream, consumer) = stream::channel(
            &config.stream_name,
            config.stream_batch_size,
            config.stream_batch_window,
        );

        let state = Self {
            config: Arc::new(config),
            entry,
            stream,
            local_gateway: backends.local_gateway,
        };
        (state, consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redis_registry_without_remote_gateway_is_rejected() {
        let mut config = Config::for_tests("calls");
        config.redis_url = Some("redis://127.0.0.1:1".to_string());

        let err = Backends::from_config(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::SharedRegistryWithLocalGateway));
    }

    #[tokio::test]
    async fn default_backends_host_sockets_locally() {
        let backends = Backends::from_config(&Config::for_tests("calls")).await.unwrap();
        assert!(backends.local_gateway.is_some());
    }

    #[tokio::test]
    async fn remote_gateway_with_memory_registry_is_accepted() {
        let mut config = Config::for_tests("calls");
        config.gateway_endpoint = Some("http://127.0.0.1:1/dev".to_string());

        let backends = Backends::from_config(&config).await.unwrap();
        assert!(backends.local_gateway.is_none());
    }
}
