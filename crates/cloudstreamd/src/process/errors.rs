//! Defines the unified error surface for daemon launch and supervision.

use cloudstream_config::SocketPreparationError;
use thiserror::Error;

use crate::scheduler::SchedulerError;
use crate::telemetry::TelemetryError;
use crate::transport::ListenerError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Installing the tracing subscriber failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        #[source]
        source: TelemetryError,
    },
    /// Preparing the socket filesystem failed.
    #[error("failed to prepare listen socket: {source}")]
    Socket {
        #[source]
        source: SocketPreparationError,
    },
    /// Binding or running the listener failed.
    #[error("listener failed: {source}")]
    Listener {
        #[source]
        source: ListenerError,
    },
    /// The scheduler threads could not be started.
    #[error("failed to start scheduler: {source}")]
    Scheduler {
        #[source]
        source: SchedulerError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        #[source]
        source: ShutdownError,
    },
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<SocketPreparationError> for LaunchError {
    fn from(source: SocketPreparationError) -> Self {
        Self::Socket { source }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<SchedulerError> for LaunchError {
    fn from(source: SchedulerError) -> Self {
        Self::Scheduler { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
