//! Errors raised while binding or running the session listener.

use std::io;

use thiserror::Error;

/// Failures binding an endpoint or running its accept thread.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to resolve {endpoint}: {source}")]
    Resolve {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("{endpoint} resolved to no addresses")]
    Unresolved { endpoint: String },
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to switch {endpoint} to polling mode: {source}")]
    Configure {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("another process is serving {path}")]
    SocketInUse { path: String },
    #[error("{path} exists and is not a socket")]
    NotASocket { path: String },
    #[error("could not clear stale socket {path}: {source}")]
    StaleSocket {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn accept thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("accept thread panicked")]
    AcceptPanicked,
}
