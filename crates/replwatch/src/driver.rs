//! Boundary to the document-store driver.
//!
//! Everything above this module talks to the cluster through
//! [`ClusterDriver`], so the connection guard and the executor can be
//! exercised against a recording fake. [`MongoDriver`] is the production
//! implementation backed by the official `mongodb` crate.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::Client;
use mongodb::bson::Document;
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use thiserror::Error;

/// Broad classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverFailure {
    /// The link to the cluster could not be used (DNS, I/O, server
    /// selection, invalid connection string).
    Connection,
    /// The cluster received the command and rejected it.
    Command,
}

impl fmt::Display for DriverFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Command => "command",
        };
        formatter.write_str(label)
    }
}

/// Error reported by a [`ClusterDriver`] implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    failure: DriverFailure,
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl DriverError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(failure: DriverFailure, message: impl Into<String>) -> Self {
        Self {
            failure,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error that wraps an underlying source, reusing its message.
    #[must_use]
    pub fn with_source(
        failure: DriverFailure,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        let source = source.into();
        Self {
            failure,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Classification of the failure.
    #[must_use]
    pub const fn failure(&self) -> DriverFailure {
        self.failure
    }

    /// Human-readable message describing the failure.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

/// Operations the core needs from a document-store driver.
///
/// Implementations do not apply deadlines themselves; callers wrap every
/// call in its own timeout scope.
#[async_trait]
pub trait ClusterDriver: Send + Sync + 'static {
    /// Opaque live link to the cluster.
    type Handle: Send + Sync + 'static;

    /// Establishes a new connection.
    async fn connect(&self, uri: &str) -> Result<Self::Handle, DriverError>;

    /// Tears a connection down.
    async fn disconnect(&self, handle: &Self::Handle) -> Result<(), DriverError>;

    /// Runs one administrative command against `database` and returns the
    /// reply document.
    async fn run_command(
        &self,
        handle: &Self::Handle,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError>;
}

/// Driver backed by the official MongoDB client.
#[derive(Debug, Clone, Copy)]
pub struct MongoDriver {
    timeout: Duration,
}

impl MongoDriver {
    /// Builds a driver whose client-side connect and server-selection
    /// timeouts match the per-operation timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn classify(error: mongodb::error::Error) -> DriverError {
    let failure = if matches!(*error.kind, ErrorKind::Command(_) | ErrorKind::Write(_)) {
        DriverFailure::Command
    } else {
        DriverFailure::Connection
    };
    DriverError::with_source(failure, error)
}

#[async_trait]
impl ClusterDriver for MongoDriver {
    type Handle = Client;

    async fn connect(&self, uri: &str) -> Result<Client, DriverError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|error| DriverError::with_source(DriverFailure::Connection, error))?;
        options.connect_timeout = Some(self.timeout);
        options.server_selection_timeout = Some(self.timeout);
        Client::with_options(options)
            .map_err(|error| DriverError::with_source(DriverFailure::Connection, error))
    }

    async fn disconnect(&self, handle: &Client) -> Result<(), DriverError> {
        handle.clone().shutdown().await;
        Ok(())
    }

    async fn run_command(
        &self,
        handle: &Client,
        database: &str,
        command: Document,
    ) -> Result<Document, DriverError> {
        handle
            .database(database)
            .run_command(command)
            .await
            .map_err(classify)
    }
}
