//! Connection factories for transmission sinks.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Opens the write side of a transmission.
pub trait Connector: Send + Sync {
    /// Connects to `host:port`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error when the remote cannot be reached.
    fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>>;
}

/// Plain TCP connector with a connect timeout.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>> {
        let address = resolve(host, port)?;
        let stream = TcpStream::connect_timeout(&address, self.timeout)?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }
}

fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    (host, port).to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {host}:{port}"),
        )
    })
}
