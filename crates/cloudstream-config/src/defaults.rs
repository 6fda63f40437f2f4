//! Default values applied when neither a flag nor an environment variable is
//! supplied.

use std::num::NonZeroUsize;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// Loopback address the daemon binds by default.
pub const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";

/// TCP port the daemon binds by default.
pub const DEFAULT_LISTEN_PORT: u16 = 9779;

/// Default tracing filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Worker threads started when no size is configured.
pub const DEFAULT_WORKERS: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(workers) => workers,
    None => NonZeroUsize::MIN,
};

/// Owned copy of [`DEFAULT_LOG_FILTER`].
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log record layout.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default listen endpoint: TCP on the loopback interface.
#[must_use]
pub fn default_listen_endpoint() -> SocketEndpoint {
    SocketEndpoint::tcp(DEFAULT_LISTEN_HOST, DEFAULT_LISTEN_PORT)
}

/// Default worker pool size.
#[must_use]
pub fn default_workers() -> NonZeroUsize {
    DEFAULT_WORKERS
}
