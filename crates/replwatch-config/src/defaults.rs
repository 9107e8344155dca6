/// Connection string used when neither the flag nor the environment sets one.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Environment variable consulted for the connection string.
pub const URI_ENV: &str = "MONGODB_URI";

/// Per-operation timeout applied to every cluster call, in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Smallest accepted per-operation timeout, in seconds.
pub const MIN_TIMEOUT_SECONDS: u64 = 1;

/// Largest accepted per-operation timeout, in seconds.
pub const MAX_TIMEOUT_SECONDS: u64 = 1800;

/// Database that administrative commands run against.
pub const DEFAULT_ADMIN_DB: &str = "admin";

/// TCP port the HTTP service listens on.
pub const DEFAULT_PORT: u16 = 20000;

/// Lowest port the HTTP service may bind; privileged ports are refused.
pub const MIN_PORT: u16 = 1025;

/// Listener timeouts are this multiple of the per-operation timeout.
pub const LISTENER_TIMEOUT_FACTOR: u32 = 3;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binary.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Default connection invalidation policy for the HTTP service.
#[must_use]
pub fn default_invalidation_policy() -> crate::policy::InvalidationPolicy {
    crate::policy::InvalidationPolicy::AnyFailure
}
