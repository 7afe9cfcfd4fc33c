use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = fanout_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// Push connections accepted by the in-process gateway.
    pub const CONNECTION: &str = "conn";
    /// Invocations handled by the entry router (used as a tracing field).
    pub const INVOCATION: &str = "inv";
}
