//! Shared configuration for the replwatch binary.
//!
//! Settings come from command-line flags with environment fallbacks for the
//! connection string and the logging knobs. [`Config::load_from_iter`]
//! parses and validates in one step so an out-of-range timeout or an empty
//! database name aborts start-up before any connection is attempted.

mod defaults;
mod logging;
mod policy;

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_ADMIN_DB, DEFAULT_LOG_FILTER, DEFAULT_PORT, DEFAULT_TIMEOUT_SECONDS, DEFAULT_URI,
    LISTENER_TIMEOUT_FACTOR, MAX_TIMEOUT_SECONDS, MIN_PORT, MIN_TIMEOUT_SECONDS, URI_ENV,
    default_invalidation_policy, default_log_filter, default_log_format,
};
pub use logging::LogFormat;
pub use policy::InvalidationPolicy;

/// Argument value that selects standard input as the initiation document.
pub const STDIN_ARGUMENT: &str = "-";

/// Resolved configuration for both the one-shot command and the service.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "replwatch",
    version,
    about = "Report MongoDB replica set status, initiate a replica set, or serve status over HTTP"
)]
pub struct Config {
    /// MongoDB connection string.
    #[arg(long, env = URI_ENV, value_name = "URI", default_value = DEFAULT_URI)]
    pub uri: String,

    /// Timeout applied to each call to the cluster, in seconds.
    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        default_value_t = DEFAULT_TIMEOUT_SECONDS
    )]
    pub timeout_seconds: u64,

    /// Name of the administrative database.
    #[arg(long = "admindb", value_name = "NAME", default_value = DEFAULT_ADMIN_DB)]
    pub admin_db: String,

    /// Initiate the replica set with the configuration document at PATH.
    /// Use `-` to read the document from standard input.
    #[arg(long, value_name = "PATH")]
    pub initiate: Option<String>,

    /// Serve replica set status over HTTP instead of printing it once.
    #[arg(long)]
    pub serve: bool,

    /// Port the HTTP service listens on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Tracing filter directive, for example `info` or `replwatch=debug`.
    #[arg(long, env = "REPLWATCH_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format: `json` or `compact`.
    #[arg(long, env = "REPLWATCH_LOG_FORMAT", default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Failures that drop the shared connection: `any-failure` or
    /// `connection-failure`.
    #[arg(
        long = "invalidate-on",
        env = "REPLWATCH_INVALIDATE_ON",
        default_value_t = InvalidationPolicy::AnyFailure
    )]
    pub invalidation_policy: InvalidationPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_owned(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            admin_db: DEFAULT_ADMIN_DB.to_owned(),
            initiate: None,
            serve: false,
            port: DEFAULT_PORT,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: default_log_format(),
            invalidation_policy: default_invalidation_policy(),
        }
    }
}

/// Where the replica set initiation document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Read the document from standard input.
    Stdin,
    /// Read the document from a file.
    File(PathBuf),
}

impl DocumentSource {
    /// Interprets an `--initiate` argument.
    #[must_use]
    pub fn from_argument(argument: &str) -> Self {
        if argument == STDIN_ARGUMENT {
            Self::Stdin
        } else {
            Self::File(PathBuf::from(argument))
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Argument parsing failed, or help/version output was requested.
    #[error("{0}")]
    Cli(#[from] clap::Error),
    /// The timeout lies outside the accepted range.
    #[error("allowed timeout values are between 1 and 1800 seconds, got {value}")]
    TimeoutOutOfRange {
        /// Rejected timeout in seconds.
        value: u64,
    },
    /// The administrative database name was empty.
    #[error("admindb name must not be empty")]
    EmptyAdminDb,
    /// The port lies outside the accepted range.
    #[error("allowed port values are between 1025 and 65535, got {value}")]
    PortOutOfRange {
        /// Rejected port.
        value: u16,
    },
}

impl Config {
    /// Loads configuration from an explicit argument list. The first item is
    /// treated as the binary name. Environment fallbacks still apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut config = Self::try_parse_from(args)?;
        config.resolve_empty_uri();
        config.validate()?;
        Ok(config)
    }

    /// An empty `--uri` falls back to the environment, then to the default.
    fn resolve_empty_uri(&mut self) {
        if !self.uri.trim().is_empty() {
            return;
        }
        self.uri = std::env::var(URI_ENV)
            .ok()
            .filter(|uri| !uri.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URI.to_owned());
    }

    /// Checks value ranges that the argument parser cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(ConfigError::TimeoutOutOfRange {
                value: self.timeout_seconds,
            });
        }
        if self.admin_db.is_empty() {
            return Err(ConfigError::EmptyAdminDb);
        }
        if self.port < MIN_PORT {
            return Err(ConfigError::PortOutOfRange { value: self.port });
        }
        Ok(())
    }

    /// Connection string for the cluster.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri.as_str()
    }

    /// Deadline applied to each cluster operation.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Upper bound on a whole HTTP exchange.
    #[must_use]
    pub fn listener_timeout(&self) -> Duration {
        self.timeout().saturating_mul(LISTENER_TIMEOUT_FACTOR)
    }

    /// Database that administrative commands run against.
    #[must_use]
    pub fn admin_db(&self) -> &str {
        self.admin_db.as_str()
    }

    /// Source of the initiation document, when initiation was requested.
    #[must_use]
    pub fn initiation_source(&self) -> Option<DocumentSource> {
        self.initiate
            .as_deref()
            .filter(|argument| !argument.is_empty())
            .map(DocumentSource::from_argument)
    }

    /// Returns `true` when the HTTP service should run.
    #[must_use]
    pub const fn serve(&self) -> bool {
        self.serve
    }

    /// Port the HTTP service listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Tracing filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Policy deciding which failures drop the shared connection.
    #[must_use]
    pub const fn invalidation_policy(&self) -> InvalidationPolicy {
        self.invalidation_policy
    }
}
