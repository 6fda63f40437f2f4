//! Response serialization helpers for the dispatch loop.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;

use crate::completion::ReadResponse;

use super::errors::DispatchError;

/// Response messages sent to clients, one JSON line each.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DaemonMessage {
    /// Outcome of `create`; `error` is `null` on success.
    Created { error: Option<String> },
    /// Outcome of `parse`; `error` is `null` on success.
    Parsed { error: Option<String> },
    Destroyed,
    NumPoints { value: u64 },
    Schema { schema: Value },
    /// A read finished phase 1. `error` is always `null`.
    Accepted {
        error: (),
        num_points: u64,
        num_bytes: u64,
    },
    /// A read that will not stream anything.
    Rejected { error: String },
    Cancelled { cancelled: bool },
    /// A request that could not be served.
    Error { message: String },
}

impl DaemonMessage {
    pub fn error(error: &DispatchError) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }
}

impl From<ReadResponse> for DaemonMessage {
    fn from(response: ReadResponse) -> Self {
        match response {
            ReadResponse::Accepted {
                num_points,
                num_bytes,
            } => Self::Accepted {
                error: (),
                num_points,
                num_bytes,
            },
            ReadResponse::Rejected(error) => Self::Rejected { error },
        }
    }
}

/// Writer that frames daemon messages as JSONL.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a daemon message as a JSONL line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_message(&mut self, message: &DaemonMessage) -> Result<(), DispatchError> {
        serde_json::to_writer(&mut self.writer, message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Response writer shared between a connection thread and the callbacks it
/// hands to its session. Whole lines are written under the lock so
/// asynchronous responses never interleave mid-line.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<ResponseWriter<Box<dyn Write + Send>>>>,
}

impl SharedWriter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ResponseWriter::new(Box::new(writer)))),
        }
    }

    /// Writes one message.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn send(&self, message: &DaemonMessage) -> Result<(), DispatchError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_message(message)
    }

    /// Reports `error` to the client.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn send_error(&self, error: &DispatchError) -> Result<(), DispatchError> {
        self.send(&DaemonMessage::error(error))
    }
}

impl std::fmt::Debug for SharedWriter {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("SharedWriter").finish_non_exhaustive()
    }
}
