use std::sync::Arc;

use thiserror::Error;

use crate::query::Query;
use crate::scheduler::CancellationToken;
use crate::schema::Schema;
use crate::source::{PointSource, SourceError};
use crate::transmit::{BufferTransmitter, Connector, TransmitError};

use super::factory::ReadRequest;

/// Errors raised while preparing or running a read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The schema resolved to zero bytes per point.
    #[error("Schema has no dimensions")]
    EmptySchema,
    /// The worst-case buffer could not be allocated.
    #[error("Memory allocation failed in READ")]
    Allocation { bytes: Option<usize> },
    /// The source query failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The source reported more points than the buffer holds.
    #[error("source wrote {points} points into a {capacity}-byte buffer")]
    Overrun { points: u64, capacity: usize },
}

/// A decoded read bound to a source and its output buffer.
///
/// The buffer is allocated up front for every point of the source, because
/// the match count is unknown until the query has run. It stays owned by the
/// command through both phases and is freed when the command drops.
pub struct ReadCommand {
    source: Arc<dyn PointSource>,
    host: String,
    port: u16,
    schema: Schema,
    stride: usize,
    query: Query,
    buffer: Vec<u8>,
    num_points: u64,
    num_bytes: usize,
    token: CancellationToken,
}

impl ReadCommand {
    /// Resolves the schema against `source` and allocates the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::EmptySchema`] when no bytes would be produced per
    /// point and [`ReadError::Allocation`] when the buffer cannot be reserved.
    pub fn new(
        source: Arc<dyn PointSource>,
        request: ReadRequest,
        token: CancellationToken,
    ) -> Result<Self, ReadError> {
        let ReadRequest {
            host,
            port,
            schema,
            query,
        } = request;
        let schema = schema.or_native(source.as_ref());
        let stride = schema.stride();
        if stride == 0 {
            return Err(ReadError::EmptySchema);
        }

        let bytes = usize::try_from(source.num_points())
            .ok()
            .and_then(|points| points.checked_mul(stride))
            .ok_or(ReadError::Allocation { bytes: None })?;
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(bytes)
            .map_err(|_| ReadError::Allocation { bytes: Some(bytes) })?;
        buffer.resize(bytes, 0);

        Ok(Self {
            source,
            host,
            port,
            schema,
            stride,
            query,
            buffer,
            num_points: 0,
            num_bytes: 0,
            token,
        })
    }

    /// Runs the query, filling the buffer in place and recording the counts.
    ///
    /// # Errors
    ///
    /// Propagates source failures and rejects counts that exceed the buffer.
    pub fn run(&mut self) -> Result<(), ReadError> {
        let buffer = self.buffer.as_mut_slice();
        let points = match &self.query {
            Query::Range(query) => self.source.read_range(buffer, &self.schema, query),
            Query::Quad(query) => self.source.read_quad(buffer, &self.schema, query),
            Query::Radius(query) => self.source.read_radius(buffer, &self.schema, query),
        }?;

        let capacity = self.buffer.len();
        let bytes = usize::try_from(points)
            .ok()
            .and_then(|points| points.checked_mul(self.stride))
            .filter(|bytes| *bytes <= capacity)
            .ok_or(ReadError::Overrun { points, capacity })?;
        self.num_points = points;
        self.num_bytes = bytes;
        Ok(())
    }

    /// Connects a transmitter over the filled part of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitError::Connect`] when the remote host is
    /// unreachable.
    pub fn transmitter<'a>(
        &'a self,
        connector: &dyn Connector,
    ) -> Result<BufferTransmitter<'a>, TransmitError> {
        BufferTransmitter::connect(connector, &self.host, self.port, self.payload())
    }

    /// The bytes produced by [`run`](Self::run).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.buffer.get(..self.num_bytes).unwrap_or_default()
    }

    #[must_use]
    pub fn num_points(&self) -> u64 {
        self.num_points
    }

    #[must_use]
    pub fn num_bytes(&self) -> usize {
        self.num_bytes
    }

    #[must_use]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl std::fmt::Debug for ReadCommand {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReadCommand")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("stride", &self.stride)
            .field("query", &self.query)
            .field("capacity", &self.buffer.len())
            .field("num_points", &self.num_points)
            .field("num_bytes", &self.num_bytes)
            .field("generation", &self.token.generation())
            .finish_non_exhaustive()
    }
}
