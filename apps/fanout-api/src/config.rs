use std::time::Duration;

/// Fan-out service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name of the inbound event stream accepted by the records endpoint.
    pub stream_name: String,
    /// Registry identifier; namespaces every key written to the registry store.
    pub connection_table: String,
    /// Remote push endpoint (e.g. `https://abc.execute-api.eu-west-1.amazonaws.com/dev`).
    /// When unset, connections are hosted in-process on `/gateway`.
    pub gateway_endpoint: Option<String>,
    /// Redis connection string. When unset, the registry is kept in memory.
    pub redis_url: Option<String>,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// TTL written with each registry entry on CONNECT. Zero disables expiry.
    pub connection_ttl_secs: u64,
    /// Maximum number of pushes in flight for a single event.
    pub push_concurrency: usize,
    /// Maximum number of records grouped into one stream batch.
    pub stream_batch_size: usize,
    /// How long the stream consumer waits to fill a batch.
    pub stream_batch_window: Duration,
    /// Deadline for a single invocation of the entry router.
    pub invocation_timeout: Duration,
    /// Per-request timeout used by the remote push gateway.
    pub gateway_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            stream_name: required_var("STREAM_NAME"),
            connection_table: required_var("CONNECTION_TABLE"),
            gateway_endpoint: optional_var("API_GATEWAY_ENDPOINT")
                .map(|v| v.trim_end_matches('/').to_string()),
            redis_url: optional_var("REDIS_URL"),
            port: parsed_var("PORT").unwrap_or(4010),
            connection_ttl_secs: parsed_var("CONNECTION_TTL_SECS").unwrap_or(2 * 60 * 60),
            push_concurrency: parsed_var("PUSH_CONCURRENCY").unwrap_or(64).max(1),
            stream_batch_size: parsed_var("STREAM_BATCH_SIZE").unwrap_or(100).max(1),
            stream_batch_window: Duration::from_millis(
                parsed_var("STREAM_BATCH_WINDOW_MS").unwrap_or(250),
            ),
            invocation_timeout: Duration::from_secs(
                parsed_var("INVOCATION_TIMEOUT_SECS").unwrap_or(60),
            ),
            gateway_timeout: Duration::from_millis(parsed_var("GATEWAY_TIMEOUT_MS").unwrap_or(5000)),
        }
    }

    /// Defaults suitable for tests: in-memory registry, in-process gateway.
    pub fn for_tests(stream_name: &str) -> Self {
        Self {
            stream_name: stream_name.to_string(),
            connection_table: "connections_test".to_string(),
            gateway_endpoint: None,
            redis_url: None,
            port: 0,
            connection_ttl_secs: 0,
            push_concurrency: 8,
            stream_batch_size: 10,
            stream_batch_window: Duration::from_millis(20),
            invocation_timeout: Duration::from_secs(5),
            gateway_timeout: Duration::from_millis(500),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
