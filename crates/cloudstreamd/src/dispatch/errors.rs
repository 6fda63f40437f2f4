//! Error types for request dispatch failures.
//!
//! Every variant is reported to the client as an `error` response; only
//! [`DispatchError::RequestTooLarge`] and I/O failures end the connection.

use std::io;

use thiserror::Error;

use crate::read::InvocationError;
use crate::session::SessionError;

/// Errors surfaced during request parsing and dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request line could not be parsed as valid JSON.
    #[error("malformed JSONL: {message}")]
    MalformedJsonl {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request JSON does not match the `SessionRequest` shape.
    #[error("invalid request structure: {message}")]
    InvalidStructure { message: String },

    /// The command name is not recognised.
    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    /// Request exceeds the maximum allowed size.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge { size: usize, max_size: usize },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Response serialization failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),

    /// The session refused the invocation outright.
    #[error(transparent)]
    Invocation(#[from] InvocationError),

    /// A synchronous session query failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The source reported a schema that is not valid JSON.
    #[error("source schema is not valid JSON: {message}")]
    InvalidSchema { message: String },
}

impl DispatchError {
    /// Whether the connection must close after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RequestTooLarge { .. } | Self::Io(_))
    }

    /// Creates a malformed JSONL error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJsonl {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a malformed JSONL error with a custom message.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedJsonl {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates a request too large error.
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }

    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }
}
