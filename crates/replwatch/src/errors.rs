//! Failure taxonomy shared by the executor, guard, and encoder.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use replwatch_config::InvalidationPolicy;

use crate::driver::DriverError;

/// Kind of a [`ClusterError`], used for logging and error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The connection could not be established or used.
    Connect,
    /// An operation exceeded its deadline.
    Timeout,
    /// The cluster rejected the command.
    Upstream,
    /// The initiation document was malformed.
    Parse,
    /// The reply could not be serialised.
    Encode,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connect => "connect",
            Self::Timeout => "timeout",
            Self::Upstream => "upstream",
            Self::Parse => "parse",
            Self::Encode => "encode",
        };
        formatter.write_str(label)
    }
}

/// Errors surfaced by cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// The connection could not be established or used.
    #[error("{operation}: {source}")]
    Connect {
        /// Operation that needed the connection.
        operation: &'static str,
        /// Driver failure.
        #[source]
        source: DriverError,
    },
    /// An operation exceeded its deadline.
    #[error("{operation}: timed out after {}s", .timeout.as_secs_f64())]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The cluster rejected the command.
    #[error("{operation}: {source}")]
    Upstream {
        /// Command the cluster rejected.
        operation: &'static str,
        /// Error reported by the cluster.
        #[source]
        source: DriverError,
    },
    /// The initiation document was malformed.
    #[error("invalid initiation document: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },
    /// The reply could not be serialised.
    #[error("failed to encode reply: {message}")]
    Encode {
        /// Serialiser diagnostic.
        message: String,
    },
}

impl ClusterError {
    /// Creates a parse error from any displayable diagnostic.
    #[must_use]
    pub fn parse(message: impl fmt::Display) -> Self {
        Self::Parse {
            message: message.to_string(),
        }
    }

    /// Creates an encode error from any displayable diagnostic.
    #[must_use]
    pub fn encode(message: impl fmt::Display) -> Self {
        Self::Encode {
            message: message.to_string(),
        }
    }

    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } => ErrorKind::Connect,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Encode { .. } => ErrorKind::Encode,
        }
    }

    /// Decides whether the connection that produced this error must be
    /// dropped. Connection failures and timeouts always drop it; upstream
    /// rejections follow `policy`; input and encoding errors never do.
    #[must_use]
    pub const fn invalidates_connection(&self, policy: InvalidationPolicy) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => true,
            Self::Upstream { .. } => policy.invalidates_on_upstream(),
            Self::Parse { .. } | Self::Encode { .. } => false,
        }
    }
}
