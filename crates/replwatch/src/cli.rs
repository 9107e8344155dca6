//! Command-line runtime shared by the binary and the integration tests.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use replwatch_config::{Config, ConfigError};

use crate::driver::MongoDriver;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::oneshot::{self, OneShotError};
use crate::service::{self, ServeError};
use crate::telemetry::{self, TelemetryError};

const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to initialise telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error(transparent)]
    OneShot(#[from] OneShotError),
    #[error(transparent)]
    Serve(#[from] ServeError),
    #[error("failed to write result: {0}")]
    WriteResult(#[source] io::Error),
}

/// Runs the command line using the provided arguments and IO handles.
///
/// Help and version requests print to `stdout` and succeed. Every other
/// failure prints a diagnostic to `stderr` and yields a failing exit code.
#[must_use]
pub fn run<I, T, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    W: Write,
    E: Write,
{
    let config = match Config::load_from_iter(args) {
        Ok(config) => config,
        Err(ConfigError::Cli(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(ConfigError::Cli(error)) => {
            let _ = write!(stderr, "{error}");
            return ExitCode::FAILURE;
        }
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            return ExitCode::FAILURE;
        }
    };

    match execute(&config, stdout, stderr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn execute<W, E>(config: &Config, stdout: &mut W, stderr: &mut E) -> Result<(), AppError>
where
    W: Write,
    E: Write,
{
    telemetry::initialise(config)?;
    let reporter = Arc::new(StructuredHealthReporter::new());
    reporter.configuration_loaded(config);

    let document = if config.serve() {
        None
    } else {
        config
            .initiation_source()
            .map(|source| oneshot::load_document(&source, io::stdin().lock(), stderr))
            .transpose()?
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    let driver = MongoDriver::new(config.timeout());

    if config.serve() {
        runtime.block_on(service::serve(
            Arc::new(driver),
            config,
            reporter,
            shutdown_signal(),
        ))?;
        return Ok(());
    }

    let encoded = runtime.block_on(oneshot::run_once(&driver, config, document.as_deref()))?;
    stdout
        .write_all(&encoded)
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .map_err(AppError::WriteResult)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(target: CLI_TARGET, %error, "failed to listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                warn!(target: CLI_TARGET, %error, "failed to listen for termination");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!(target: CLI_TARGET, "shutdown signal received");
}
