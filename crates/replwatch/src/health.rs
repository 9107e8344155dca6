//! Structured health reporting for connection lifecycle events.

use std::sync::Arc;

use replwatch_config::Config;

use crate::errors::ClusterError;

/// Observer trait used to surface connection events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked once the configuration has been resolved.
    fn configuration_loaded(&self, config: &Config);

    /// Invoked before a connection is established.
    fn connection_establishing(&self);

    /// Invoked after a connection is established.
    fn connection_ready(&self);

    /// Invoked when establishing a connection fails.
    fn connection_failed(&self, error: &ClusterError);

    /// Invoked when a caller asks for its connection to be dropped.
    /// `cleared` is `false` when the handle had already been superseded.
    fn connection_invalidated(&self, cleared: bool);

    /// Invoked after a connection has been closed.
    fn connection_closed(&self);

    /// Invoked when closing a connection fails.
    fn connection_close_failed(&self, error: &ClusterError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn configuration_loaded(&self, config: &Config) {
        (**self).configuration_loaded(config);
    }

    fn connection_establishing(&self) {
        (**self).connection_establishing();
    }

    fn connection_ready(&self) {
        (**self).connection_ready();
    }

    fn connection_failed(&self, error: &ClusterError) {
        (**self).connection_failed(error);
    }

    fn connection_invalidated(&self, cleared: bool) {
        (**self).connection_invalidated(cleared);
    }

    fn connection_closed(&self) {
        (**self).connection_closed();
    }

    fn connection_close_failed(&self, error: &ClusterError) {
        (**self).connection_close_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn configuration_loaded(&self, config: &Config) {
        tracing::info!(
            target: "replwatch::health",
            event = "configuration_loaded",
            admin_db = %config.admin_db(),
            timeout_seconds = config.timeout().as_secs(),
            serve = config.serve(),
            log_format = ?config.log_format(),
            invalidate_on = %config.invalidation_policy(),
            "configuration resolved"
        );
    }

    fn connection_establishing(&self) {
        tracing::info!(
            target: "replwatch::health",
            event = "connection_establishing",
            "connecting to cluster"
        );
    }

    fn connection_ready(&self) {
        tracing::info!(
            target: "replwatch::health",
            event = "connection_ready",
            "cluster connection ready"
        );
    }

    fn connection_failed(&self, error: &ClusterError) {
        tracing::error!(
            target: "replwatch::health",
            event = "connection_failed",
            kind = %error.kind(),
            error = %error,
            "failed to connect to cluster"
        );
    }

    fn connection_invalidated(&self, cleared: bool) {
        tracing::warn!(
            target: "replwatch::health",
            event = "connection_invalidated",
            cleared,
            "dropping cluster connection after a failed operation"
        );
    }

    fn connection_closed(&self) {
        tracing::debug!(
            target: "replwatch::health",
            event = "connection_closed",
            "cluster connection closed"
        );
    }

    fn connection_close_failed(&self, error: &ClusterError) {
        tracing::warn!(
            target: "replwatch::health",
            event = "connection_close_failed",
            kind = %error.kind(),
            error = %error,
            "failed to close cluster connection"
        );
    }
}
