//! Shared configuration for the point-cloud streaming daemon.
//!
//! Settings are resolved from command-line flags first and environment
//! variables second, falling back to the defaults in [`defaults`]. The
//! resulting [`Config`] is serialisable so the daemon can log the effective
//! configuration at startup.

use std::ffi::OsString;
use std::num::NonZeroUsize;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod defaults;
mod logging;
mod socket;

pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Environment variable overriding the listen endpoint.
pub const LISTEN_ENV: &str = "CLOUDSTREAM_LISTEN";
/// Environment variable overriding the log filter.
pub const LOG_FILTER_ENV: &str = "CLOUDSTREAM_LOG_FILTER";
/// Environment variable overriding the log format.
pub const LOG_FORMAT_ENV: &str = "CLOUDSTREAM_LOG_FORMAT";
/// Environment variable overriding the worker pool size.
pub const WORKERS_ENV: &str = "CLOUDSTREAM_WORKERS";

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser, Serialize, Deserialize)]
#[command(
    name = "cloudstreamd",
    version,
    about = "Streams point-cloud query results to remote consumers"
)]
pub struct Config {
    /// Endpoint the daemon accepts session connections on.
    #[arg(long, env = LISTEN_ENV, default_value_t = defaults::default_listen_endpoint())]
    pub listen: SocketEndpoint,

    /// Tracing filter expression (for example `info` or `cloudstreamd=debug`).
    #[arg(long, env = LOG_FILTER_ENV, default_value = defaults::DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Output format for log records.
    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = defaults::default_log_format())]
    pub log_format: LogFormat,

    /// Number of worker threads running reads and transmissions.
    #[arg(long, env = WORKERS_ENV, default_value_t = defaults::default_workers())]
    pub workers: NonZeroUsize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: defaults::default_listen_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            workers: defaults::default_workers(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Arguments`] when a flag or environment value
    /// fails to parse. Help and version requests are reported through the
    /// same variant so the caller can print them and exit.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self::try_parse()?)
    }

    /// Loads configuration from an explicit argument list.
    ///
    /// The first item is treated as the binary name, mirroring
    /// [`std::env::args_os`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Arguments`] when parsing fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::try_parse_from(args)?)
    }

    /// Endpoint the daemon listens on.
    #[must_use]
    pub fn listen(&self) -> &SocketEndpoint {
        &self.listen
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for log records.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker pool size.
    #[must_use]
    pub fn workers(&self) -> NonZeroUsize {
        self.workers
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A flag or environment value could not be parsed.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
}
