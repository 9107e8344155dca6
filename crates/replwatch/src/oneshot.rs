//! Single status query or initiation from the command line.
//!
//! The one-shot path opens its own connection, runs one command, and closes
//! the connection before anything is printed. Every failure is fatal.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use replwatch_config::{Config, DocumentSource};

use crate::driver::ClusterDriver;
use crate::encoder;
use crate::errors::ClusterError;
use crate::executor;

const ONESHOT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::oneshot");

/// Notice written to standard error before the document is read from stdin.
pub const STDIN_NOTICE: &str = "reading replicaSet config document from stdin";

/// Errors that abort a one-shot run.
#[derive(Debug, Error)]
pub enum OneShotError {
    /// The initiation document file could not be opened.
    #[error("failed to open replicaSet config document {}: {source}", .path.display())]
    OpenDocument {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The initiation document could not be read.
    #[error("failed to read replicaSet config document: {0}")]
    ReadDocument(#[source] io::Error),
    /// The connection could not be opened.
    #[error("failed to connect to mongo: {0}")]
    Connect(#[source] ClusterError),
    /// The status query failed.
    #[error("failed to get replicaSet status: {0}")]
    Status(#[source] ClusterError),
    /// Initiation failed, including a malformed document.
    #[error("failed to initiate replicaSet: {0}")]
    Initiate(#[source] ClusterError),
    /// The reply could not be encoded.
    #[error("failed to produce string result: {0}")]
    Encode(#[source] ClusterError),
    /// The connection could not be closed.
    #[error("failed to disconnect from mongo: {0}")]
    Disconnect(#[source] ClusterError),
}

/// Reads the initiation document from `source`.
///
/// When reading from standard input a notice is written to `stderr` first so
/// an interactive user knows the command is waiting.
///
/// # Errors
///
/// Returns [`OneShotError::OpenDocument`] or [`OneShotError::ReadDocument`]
/// when the document cannot be read.
pub fn load_document<R, E>(
    source: &DocumentSource,
    stdin: R,
    stderr: &mut E,
) -> Result<Vec<u8>, OneShotError>
where
    R: Read,
    E: Write,
{
    let mut document = Vec::new();
    match source {
        DocumentSource::Stdin => {
            let _ = writeln!(stderr, "{STDIN_NOTICE}");
            let mut reader = stdin;
            reader
                .read_to_end(&mut document)
                .map_err(OneShotError::ReadDocument)?;
        }
        DocumentSource::File(path) => {
            let mut file = File::open(path).map_err(|source| OneShotError::OpenDocument {
                path: path.clone(),
                source,
            })?;
            file.read_to_end(&mut document)
                .map_err(OneShotError::ReadDocument)?;
        }
    }
    Ok(document)
}

/// Queries the status, or initiates the replica set when `document` is
/// given, and returns the encoded reply.
///
/// The connection is closed before returning. When the command succeeds a
/// failed close is still an error, so no output is produced for a run that
/// did not shut down cleanly.
///
/// # Errors
///
/// Returns the [`OneShotError`] of the first stage that failed.
pub async fn run_once<D: ClusterDriver>(
    driver: &D,
    config: &Config,
    document: Option<&[u8]>,
) -> Result<Vec<u8>, OneShotError> {
    let timeout = config.timeout();
    let handle = executor::connect(driver, config.uri(), timeout)
        .await
        .map_err(OneShotError::Connect)?;

    let outcome = match document {
        None => executor::query_status(driver, &handle, config.admin_db(), timeout)
            .await
            .map_err(OneShotError::Status),
        Some(document) => {
            info!(target: ONESHOT_TARGET, bytes = document.len(), "initiating replica set");
            executor::initiate(driver, &handle, config.admin_db(), document, timeout)
                .await
                .map_err(OneShotError::Initiate)
        }
    }
    .and_then(|reply| encoder::encode(&reply).map_err(OneShotError::Encode));

    let closed = executor::disconnect(driver, &handle, timeout).await;
    match (outcome, closed) {
        (Ok(encoded), Ok(())) => Ok(encoded),
        (Ok(_), Err(error)) => Err(OneShotError::Disconnect(error)),
        (Err(error), closed) => {
            if let Err(close_error) = closed {
                warn!(
                    target: ONESHOT_TARGET,
                    error = %close_error,
                    "failed to disconnect after an earlier failure"
                );
            }
            Err(error)
        }
    }
}
