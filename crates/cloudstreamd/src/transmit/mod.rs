//! Raw byte streaming of read results to a remote consumer.
//!
//! The wire carries no framing: the consumer learns the total length from the
//! accepted read's `num_bytes` and reads until the connection closes.

mod connector;

use std::io::{self, Write};

use thiserror::Error;

pub use connector::{Connector, TcpConnector};

/// Bytes written per transmit call.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Writes ranges of a borrowed buffer to a connected sink.
///
/// The transmitter never owns, frees or mutates the buffer.
pub struct BufferTransmitter<'buf> {
    sink: Box<dyn Write + Send>,
    buffer: &'buf [u8],
}

impl<'buf> BufferTransmitter<'buf> {
    /// Connects to `host:port` and binds `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError::Connect`] when the connection fails.
    pub fn connect(
        connector: &dyn Connector,
        host: &str,
        port: u16,
        buffer: &'buf [u8],
    ) -> Result<Self, TransmitError> {
        let sink = connector
            .connect(host, port)
            .map_err(|source| TransmitError::Connect {
                host: host.to_owned(),
                port,
                source,
            })?;
        Ok(Self { sink, buffer })
    }

    /// Length of the bound buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Sends `length` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError::OutOfRange`] when the range leaves the buffer
    /// and [`TransmitError::Write`] when the sink fails.
    pub fn transmit(&mut self, offset: usize, length: usize) -> Result<(), TransmitError> {
        let range = offset
            .checked_add(length)
            .and_then(|end| self.buffer.get(offset..end))
            .ok_or(TransmitError::OutOfRange {
                offset,
                length,
                available: self.buffer.len(),
            })?;
        self.sink
            .write_all(range)
            .map_err(|source| TransmitError::Write {
                offset,
                length,
                source,
            })
    }

    /// Flushes the sink and closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError::Flush`] when buffered bytes cannot be sent.
    pub fn finish(mut self) -> Result<(), TransmitError> {
        self.sink
            .flush()
            .map_err(|source| TransmitError::Flush { source })
    }
}

/// Errors raised while transmitting a buffer.
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("range {offset}+{length} exceeds buffer of {available} bytes")]
    OutOfRange {
        offset: usize,
        length: usize,
        available: usize,
    },
    #[error("failed to write {length} bytes at offset {offset}: {source}")]
    Write {
        offset: usize,
        length: usize,
        #[source]
        source: io::Error,
    },
    #[error("failed to flush transmission: {source}")]
    Flush {
        #[source]
        source: io::Error,
    },
}

/// How a transmission ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitOutcome {
    /// Every byte was sent.
    Completed { bytes: usize },
    /// Cancellation was observed at a chunk boundary.
    Cancelled { sent: usize, total: usize },
    /// Connecting or writing failed.
    Failed {
        sent: usize,
        total: usize,
        error: String,
    },
}
