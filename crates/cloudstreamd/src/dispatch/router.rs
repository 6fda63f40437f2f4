//! Command routing onto a connection's session.
//!
//! Synchronous commands answer immediately. `create`, `parse` and `read`
//! answer from the scheduler's control thread through callbacks that write
//! to the connection's [`SharedWriter`].

use serde_json::Value;
use tracing::{debug, warn};

use crate::completion::{PipelineCallback, ReadCallback};
use crate::read::Argument;
use crate::session::Session;

use super::errors::DispatchError;
use super::request::SessionRequest;
use super::response::{DaemonMessage, SharedWriter};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Reported when `create` or `parse` lacks a string pipeline.
pub const PIPELINE_NOT_STRING: &str = "'pipeline' must be a string - args[0]";

/// Known session commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Parse,
    Destroy,
    NumPoints,
    Schema,
    Read,
    Cancel,
}

impl Command {
    /// Parses a command name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownCommand` if the value does not match any
    /// known command.
    pub fn parse(value: &str) -> Result<Self, DispatchError> {
        match value.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "parse" => Ok(Self::Parse),
            "destroy" => Ok(Self::Destroy),
            "num-points" => Ok(Self::NumPoints),
            "schema" => Ok(Self::Schema),
            "read" => Ok(Self::Read),
            "cancel" => Ok(Self::Cancel),
            _ => Err(DispatchError::unknown_command(value)),
        }
    }

    /// Returns the canonical string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Parse => "parse",
            Self::Destroy => "destroy",
            Self::NumPoints => "num-points",
            Self::Schema => "schema",
            Self::Read => "read",
            Self::Cancel => "cancel",
        }
    }
}

/// Routes requests to one session and writes the answers.
#[derive(Debug)]
pub struct SessionRouter {
    session: Session,
    writer: SharedWriter,
}

impl SessionRouter {
    pub fn new(session: Session, writer: SharedWriter) -> Self {
        Self { session, writer }
    }

    /// Serves one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the command is unknown, the session refuses it, or
    /// the response cannot be written.
    pub fn route(&self, request: SessionRequest) -> Result<(), DispatchError> {
        let command = Command::parse(request.command())?;
        debug!(
            target: DISPATCH_TARGET,
            command = command.as_str(),
            arguments = request.arguments.len(),
            "routing command"
        );

        match command {
            Command::Create => self.route_pipeline(request.arguments, PipelineKind::Create),
            Command::Parse => self.route_pipeline(request.arguments, PipelineKind::Parse),
            Command::Destroy => {
                self.session.destroy();
                self.writer.send(&DaemonMessage::Destroyed)
            }
            Command::NumPoints => {
                let value = self.session.num_points()?;
                self.writer.send(&DaemonMessage::NumPoints { value })
            }
            Command::Schema => {
                let text = self.session.schema()?;
                let schema = serde_json::from_str(&text)
                    .map_err(|error| DispatchError::invalid_schema(error.to_string()))?;
                self.writer.send(&DaemonMessage::Schema { schema })
            }
            Command::Read => self.route_read(request.arguments),
            Command::Cancel => {
                let cancelled = self.session.cancel();
                self.writer.send(&DaemonMessage::Cancelled { cancelled })
            }
        }
    }

    fn route_pipeline(&self, arguments: Vec<Value>, kind: PipelineKind) -> Result<(), DispatchError> {
        let Some(Value::String(pipeline)) = arguments.into_iter().next() else {
            return self
                .writer
                .send(&kind.message(Some(PIPELINE_NOT_STRING.to_owned())));
        };

        let writer = self.writer.clone();
        let callback = PipelineCallback::new(move |result: Result<(), String>| {
            deliver(&writer, &kind.message(result.err()));
        });
        match kind {
            PipelineKind::Create => self.session.create(pipeline, callback)?,
            PipelineKind::Parse => self.session.parse(pipeline, callback)?,
        }
        Ok(())
    }

    fn route_read(&self, arguments: Vec<Value>) -> Result<(), DispatchError> {
        let writer = self.writer.clone();
        let callback = ReadCallback::new(move |response| {
            deliver(&writer, &DaemonMessage::from(response));
        });
        let arguments = arguments
            .into_iter()
            .map(Argument::from)
            .chain(std::iter::once(Argument::from(callback)))
            .collect();
        self.session.read(arguments)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PipelineKind {
    Create,
    Parse,
}

impl PipelineKind {
    fn message(self, error: Option<String>) -> DaemonMessage {
        match self {
            Self::Create => DaemonMessage::Created { error },
            Self::Parse => DaemonMessage::Parsed { error },
        }
    }
}

/// Writes a callback's response; the peer may already have gone.
fn deliver(writer: &SharedWriter, message: &DaemonMessage) {
    if let Err(error) = writer.send(message) {
        warn!(target: DISPATCH_TARGET, %error, "failed to deliver callback response");
    }
}
