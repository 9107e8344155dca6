//! Timeout-scoped cluster operations.
//!
//! Connecting, disconnecting, and each administrative command run inside
//! their own deadline and are never retried. Failures are classified so
//! callers can tell an expired deadline from a cluster that answered with an
//! error.

use std::time::Duration;

use mongodb::bson::{Bson, Document, doc};

use crate::driver::{ClusterDriver, DriverFailure};
use crate::encoder::AdminReply;
use crate::errors::ClusterError;

/// Administrative commands issued against the replica set.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// Report the replica set status.
    ReplSetGetStatus,
    /// Initiate the replica set with the given configuration.
    ReplSetInitiate(Document),
}

impl AdminCommand {
    /// Command name as the cluster knows it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReplSetGetStatus => "replSetGetStatus",
            Self::ReplSetInitiate(_) => "replSetInitiate",
        }
    }

    /// Builds the command document sent to the cluster.
    #[must_use]
    pub fn into_document(self) -> Document {
        match self {
            Self::ReplSetGetStatus => doc! { "replSetGetStatus": 1 },
            Self::ReplSetInitiate(config) => doc! { "replSetInitiate": config },
        }
    }
}

/// Opens a connection to `uri` within `timeout`.
///
/// # Errors
///
/// Returns [`ClusterError::Connect`] when the driver fails and
/// [`ClusterError::Timeout`] when `timeout` elapses first.
pub async fn connect<D>(driver: &D, uri: &str, timeout: Duration) -> Result<D::Handle, ClusterError>
where
    D: ClusterDriver,
{
    match tokio::time::timeout(timeout, driver.connect(uri)).await {
        Ok(Ok(handle)) => Ok(handle),
        Ok(Err(source)) => Err(ClusterError::Connect {
            operation: CONNECT,
            source,
        }),
        Err(_elapsed) => Err(ClusterError::Timeout {
            operation: CONNECT,
            timeout,
        }),
    }
}

/// Closes `handle` within `timeout`.
///
/// # Errors
///
/// Returns [`ClusterError::Connect`] when the driver fails and
/// [`ClusterError::Timeout`] when `timeout` elapses first.
pub async fn disconnect<D>(
    driver: &D,
    handle: &D::Handle,
    timeout: Duration,
) -> Result<(), ClusterError>
where
    D: ClusterDriver,
{
    match tokio::time::timeout(timeout, driver.disconnect(handle)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(ClusterError::Connect {
            operation: DISCONNECT,
            source,
        }),
        Err(_elapsed) => Err(ClusterError::Timeout {
            operation: DISCONNECT,
            timeout,
        }),
    }
}

/// Requests the replica set status from `database`.
///
/// # Errors
///
/// Returns [`ClusterError::Timeout`] when `timeout` elapses first,
/// [`ClusterError::Upstream`] when the cluster rejects the command, and
/// [`ClusterError::Connect`] when the driver could not reach the cluster.
pub async fn query_status<D>(
    driver: &D,
    handle: &D::Handle,
    database: &str,
    timeout: Duration,
) -> Result<AdminReply, ClusterError>
where
    D: ClusterDriver,
{
    execute(driver, handle, database, AdminCommand::ReplSetGetStatus, timeout).await
}

/// Initiates the replica set with the extended-JSON `document`.
///
/// The document is parsed before anything is sent, so a malformed document
/// never reaches the cluster.
///
/// # Errors
///
/// Returns [`ClusterError::Parse`] for a malformed document, otherwise the
/// same errors as [`query_status`].
pub async fn initiate<D>(
    driver: &D,
    handle: &D::Handle,
    database: &str,
    document: &[u8],
    timeout: Duration,
) -> Result<AdminReply, ClusterError>
where
    D: ClusterDriver,
{
    let config = parse_initiation_document(document)?;
    execute(
        driver,
        handle,
        database,
        AdminCommand::ReplSetInitiate(config),
        timeout,
    )
    .await
}

/// Parses an extended-JSON replica set configuration.
///
/// # Errors
///
/// Returns [`ClusterError::Parse`] when the input is not valid JSON, not
/// valid extended JSON, or not an object at the top level.
pub fn parse_initiation_document(document: &[u8]) -> Result<Document, ClusterError> {
    let value: serde_json::Value =
        serde_json::from_slice(document).map_err(ClusterError::parse)?;
    match Bson::try_from(value).map_err(ClusterError::parse)? {
        Bson::Document(config) => Ok(config),
        other => Err(ClusterError::parse(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))),
    }
}

async fn execute<D>(
    driver: &D,
    handle: &D::Handle,
    database: &str,
    command: AdminCommand,
    timeout: Duration,
) -> Result<AdminReply, ClusterError>
where
    D: ClusterDriver,
{
    let operation = command.name();
    tracing::debug!(
        target: EXECUTOR_TARGET,
        operation,
        database,
        timeout_ms = timeout.as_millis(),
        "running administrative command"
    );
    let pending = driver.run_command(handle, database, command.into_document());
    match tokio::time::timeout(timeout, pending).await {
        Ok(Ok(document)) => Ok(AdminReply::new(document)),
        Ok(Err(source)) => match source.failure() {
            DriverFailure::Command => Err(ClusterError::Upstream { operation, source }),
            DriverFailure::Connection => Err(ClusterError::Connect { operation, source }),
        },
        Err(_elapsed) => Err(ClusterError::Timeout { operation, timeout }),
    }
}

const CONNECT: &str = "connect";
const DISCONNECT: &str = "disconnect";
const EXECUTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::executor");
