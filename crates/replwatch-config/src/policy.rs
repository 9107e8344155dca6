//! Connection invalidation policy for the HTTP service.
//!
//! After a failed operation the service decides whether the shared
//! connection is still trustworthy. Timeouts and connection failures always
//! discard it. Whether an upstream rejection (for example polling a replica
//! set that has not been initiated yet) also discards it is configurable.

use strum::{Display, EnumString};

/// Which executor failures cause the shared connection to be dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum InvalidationPolicy {
    /// Drop the connection after any failed operation, including commands
    /// the cluster rejected.
    #[default]
    AnyFailure,
    /// Drop the connection only after connection failures and timeouts.
    ConnectionFailure,
}

impl InvalidationPolicy {
    /// Returns `true` when an upstream rejection should drop the connection.
    #[must_use]
    pub const fn invalidates_on_upstream(self) -> bool {
        matches!(self, Self::AnyFailure)
    }
}
