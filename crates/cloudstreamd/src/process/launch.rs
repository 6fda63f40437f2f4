//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use cloudstream_config::Config;
use tracing::{info, warn};

use crate::dispatch::DispatchConnectionHandler;
use crate::observer::StructuredReadObserver;
use crate::scheduler::SchedulerRuntime;
use crate::source::{InlinePipelineProvider, SourceProvider};
use crate::telemetry;
use crate::transmit::{Connector, TcpConnector};
use crate::transport::{ListenerError, ListenerHandle, SocketListener};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when telemetry, the listen socket or the
/// scheduler cannot be set up, or when signal handling fails.
pub fn run_daemon(config: &Config) -> Result<(), LaunchError> {
    telemetry::initialise(config)?;
    run_daemon_with(
        config,
        Arc::new(InlinePipelineProvider::new()),
        Arc::new(TcpConnector::default()),
        &SystemShutdownSignal::new(),
    )
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with(
    config: &Config,
    provider: Arc<dyn SourceProvider>,
    connector: Arc<dyn Connector>,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(
        target: PROCESS_TARGET,
        listen = %config.listen(),
        workers = config.workers().get(),
        "starting daemon runtime"
    );
    config.listen().prepare_filesystem()?;
    let listener = SocketListener::bind(config.listen())?;

    let runtime = SchedulerRuntime::start(
        config.workers(),
        connector,
        Arc::new(StructuredReadObserver::new()),
    )?;
    let handler = Arc::new(DispatchConnectionHandler::new(runtime.scheduler(), provider));
    let listener_handle = match listener.start(handler) {
        Ok(handle) => handle,
        Err(error) => {
            runtime.shutdown();
            return Err(error.into());
        }
    };
    if let Some(addr) = listener_handle.local_addr() {
        info!(target: PROCESS_TARGET, %addr, "daemon ready");
    } else {
        info!(target: PROCESS_TARGET, "daemon ready");
    }

    let waited = shutdown.wait();
    let joined = stop_listener(listener_handle);
    runtime.shutdown();
    waited?;
    joined?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn stop_listener(handle: ListenerHandle) -> Result<(), ListenerError> {
    handle.shutdown();
    let joined = handle.join();
    if let Err(error) = &joined {
        warn!(target: PROCESS_TARGET, %error, "listener did not stop cleanly");
    }
    joined
}
