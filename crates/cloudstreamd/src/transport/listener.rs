//! Accept loop for session sockets.

use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cloudstream_config::SocketEndpoint;
use tracing::{debug, info, warn};

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use std::os::unix::net::UnixListener;

/// Pause between polls when no connection is waiting.
const IDLE_POLL: Duration = Duration::from_millis(25);
/// Pause after a failed accept.
const ERROR_PAUSE: Duration = Duration::from_millis(150);
const ACCEPT_THREAD: &str = "cloudstream-accept";

#[derive(Debug)]
enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Acceptor {
    fn set_polling(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Accepted streams are switched back to blocking mode for their
    /// handlers. `Ok(None)` means nothing was waiting.
    fn poll(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }
}

/// Endpoint bound but not yet accepting.
///
/// A bound Unix socket file belongs to the listener and is removed when the
/// listener is dropped.
#[derive(Debug)]
pub(crate) struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

impl SocketListener {
    pub(crate) fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = match endpoint {
            SocketEndpoint::Tcp { host, port } => Acceptor::Tcp(bind_tcp(endpoint, host, *port)?),
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => Acceptor::Unix(unix::bind(path.as_std_path())?),
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => {
                return Err(ListenerError::Bind {
                    endpoint: endpoint.to_string(),
                    source: io::Error::from(io::ErrorKind::Unsupported),
                });
            }
        };
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        match &self.acceptor {
            Acceptor::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Acceptor::Unix(_) => None,
        }
    }

    /// Moves the listener onto its accept thread.
    pub(crate) fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        self.acceptor
            .set_polling()
            .map_err(|source| ListenerError::Configure {
                endpoint: self.endpoint.to_string(),
                source,
            })?;

        let local_addr = self.local_addr();
        let stop = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            stop: Arc::clone(&stop),
            handler,
        };
        let accept_thread = thread::Builder::new()
            .name(ACCEPT_THREAD.to_owned())
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Spawn { source })?;
        Ok(ListenerHandle {
            stop,
            local_addr,
            accept_thread: Some(accept_thread),
        })
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let SocketEndpoint::Unix { path } = &self.endpoint {
            unix::remove(path.as_std_path());
        }
    }
}

/// Controls a running accept thread.
///
/// Dropping the handle stops accepting without waiting for the thread.
#[derive(Debug)]
pub(crate) struct ListenerHandle {
    stop: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    accept_thread: Option<JoinHandle<u64>>,
}

impl ListenerHandle {
    /// Bound TCP address; `None` for Unix sockets.
    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops accepting. Connections already accepted run on until their
    /// peers disconnect.
    pub(crate) fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept thread, which releases the endpoint on exit.
    pub(crate) fn join(mut self) -> Result<(), ListenerError> {
        let Some(accept_thread) = self.accept_thread.take() else {
            return Ok(());
        };
        let accepted = accept_thread
            .join()
            .map_err(|_| ListenerError::AcceptPanicked)?;
        debug!(target: LISTENER_TARGET, accepted, "accept thread joined");
        Ok(())
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    stop: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
}

impl AcceptLoop {
    /// Returns the number of connections accepted.
    fn run(self) -> u64 {
        let endpoint = self.listener.endpoint.to_string();
        info!(target: LISTENER_TARGET, endpoint, "accepting connections");
        let mut accepted = 0_u64;
        let mut repeated_error = None::<io::ErrorKind>;

        while !self.stop.load(Ordering::SeqCst) {
            match self.listener.acceptor.poll() {
                Ok(Some(stream)) => {
                    repeated_error = None;
                    self.serve(accepted, stream);
                    accepted = accepted.wrapping_add(1);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Log each kind of failure once per streak.
                    if repeated_error != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, %error, "accept failed");
                    }
                    repeated_error = Some(error.kind());
                    thread::sleep(ERROR_PAUSE);
                }
            }
        }

        info!(target: LISTENER_TARGET, endpoint, accepted, "stopped accepting");
        accepted
    }

    fn serve(&self, connection: u64, stream: ConnectionStream) {
        let peer = stream.peer();
        debug!(target: LISTENER_TARGET, connection, peer, "connection accepted");
        let handler = Arc::clone(&self.handler);
        let spawned = thread::Builder::new()
            .name(format!("cloudstream-conn-{connection}"))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            warn!(
                target: LISTENER_TARGET,
                connection,
                %error,
                "no thread for connection; dropping it"
            );
        }
    }
}

fn bind_tcp(endpoint: &SocketEndpoint, host: &str, port: u16) -> Result<TcpListener, ListenerError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            endpoint: endpoint.to_string(),
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| ListenerError::Unresolved {
        endpoint: endpoint.to_string(),
    })?;
    TcpListener::bind(addr).map_err(|source| ListenerError::Bind {
        endpoint: endpoint.to_string(),
        source,
    })
}

#[cfg(unix)]
mod unix {
    use std::fs;
    use std::io;
    use std::os::unix::fs::FileTypeExt;
    use std::os::unix::net::{UnixListener, UnixStream};
    use std::path::Path;

    use tracing::warn;

    use super::{LISTENER_TARGET, ListenerError};

    enum Existing {
        Nothing,
        /// A socket file nobody is listening on.
        Stale,
    }

    /// Binds `path`, replacing a socket file left behind by a dead process.
    pub(super) fn bind(path: &Path) -> Result<UnixListener, ListenerError> {
        let display = || path.display().to_string();
        if let Existing::Stale = inspect(path)? {
            fs::remove_file(path).map_err(|source| ListenerError::StaleSocket {
                path: display(),
                source,
            })?;
        }
        UnixListener::bind(path).map_err(|source| ListenerError::Bind {
            endpoint: format!("unix://{}", display()),
            source,
        })
    }

    fn inspect(path: &Path) -> Result<Existing, ListenerError> {
        let display = || path.display().to_string();
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Existing::Nothing),
            Err(source) => {
                return Err(ListenerError::StaleSocket {
                    path: display(),
                    source,
                });
            }
        };
        if !metadata.file_type().is_socket() {
            return Err(ListenerError::NotASocket { path: display() });
        }
        match UnixStream::connect(path) {
            Ok(_live) => Err(ListenerError::SocketInUse { path: display() }),
            Err(error)
                if matches!(
                    error.kind(),
                    io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
                ) =>
            {
                Ok(Existing::Stale)
            }
            Err(source) => Err(ListenerError::StaleSocket {
                path: display(),
                source,
            }),
        }
    }

    pub(super) fn remove(path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                target: LISTENER_TARGET,
                %error,
                path = %path.display(),
                "failed to remove socket file"
            ),
        }
    }
}
