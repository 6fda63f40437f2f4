//! Connection handler that serves a session over JSONL.

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::scheduler::Scheduler;
use crate::session::Session;
use crate::source::SourceProvider;
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::errors::DispatchError;
use super::request::SessionRequest;
use super::response::SharedWriter;
use super::router::{DISPATCH_TARGET, SessionRouter};

/// Maximum size of a single request line in bytes, delimiter included.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Serves requests line by line until the peer disconnects.
///
/// Every connection gets its own [`Session`]; sessions share the scheduler
/// and the source provider.
pub struct DispatchConnectionHandler {
    scheduler: Scheduler,
    provider: Arc<dyn SourceProvider>,
}

impl DispatchConnectionHandler {
    pub fn new(scheduler: Scheduler, provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            scheduler,
            provider,
        }
    }

    fn serve(&self, stream: ConnectionStream) -> Result<(), DispatchError> {
        let peer = stream.peer();
        let writer = SharedWriter::new(stream.try_clone()?);
        let session = Session::new(self.scheduler.clone(), Arc::clone(&self.provider));
        let router = SessionRouter::new(session, writer.clone());
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();
        info!(target: DISPATCH_TARGET, peer, "session opened");

        loop {
            line.clear();
            let handled = match read_request_line(&mut reader, &mut line) {
                Ok(0) => {
                    info!(target: DISPATCH_TARGET, peer, "session closed by peer");
                    return Ok(());
                }
                Ok(_) => dispatch_line(&router, &line),
                Err(error) => Err(error),
            };

            let Err(error) = handled else {
                continue;
            };
            if error.is_fatal() {
                // Best effort: the peer may already be gone.
                drop(writer.send_error(&error));
                return Err(error);
            }
            warn!(target: DISPATCH_TARGET, peer, %error, "request failed");
            writer.send_error(&error)?;
        }
    }
}

impl std::fmt::Debug for DispatchConnectionHandler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DispatchConnectionHandler")
            .finish_non_exhaustive()
    }
}

impl ConnectionHandler for DispatchConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        let closer = stream.try_clone();
        if let Err(error) = self.serve(stream) {
            warn!(target: DISPATCH_TARGET, %error, "closing connection");
            if let Ok(closer) = closer
                && let Err(error) = closer.close()
            {
                debug!(target: DISPATCH_TARGET, %error, "failed to close connection");
            }
        }
    }
}

fn dispatch_line(router: &SessionRouter, line: &[u8]) -> Result<(), DispatchError> {
    let request = SessionRequest::parse(line)?;
    request.validate()?;
    router.route(request)
}

/// Reads one request line into `line`, returning the bytes consumed; zero
/// means the peer closed the connection. A final line without a newline is
/// still returned.
fn read_request_line(
    reader: &mut impl BufRead,
    line: &mut Vec<u8>,
) -> Result<usize, DispatchError> {
    let limit = u64::try_from(MAX_REQUEST_BYTES).unwrap_or(u64::MAX) + 1;
    let read = reader.by_ref().take(limit).read_until(b'\n', line)?;
    if line.len() > MAX_REQUEST_BYTES {
        return Err(DispatchError::request_too_large(line.len(), MAX_REQUEST_BYTES));
    }
    Ok(read)
}
