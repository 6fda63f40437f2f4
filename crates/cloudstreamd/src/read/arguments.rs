//! Loosely-typed read arguments and the trailing callback.

use serde_json::Value;
use thiserror::Error;

use crate::completion::ReadCallback;

/// One positional argument of a read invocation.
#[derive(Debug)]
pub enum Argument {
    /// A JSON value; `Value::Null` stands for an absent argument.
    Value(Value),
    /// A completion handle.
    Callback(ReadCallback),
}

impl Argument {
    /// The JSON value, or `None` for callbacks.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Callback(_) => None,
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ReadCallback> for Argument {
    fn from(callback: ReadCallback) -> Self {
        Self::Callback(callback)
    }
}

/// Invocations that cannot be answered through a callback.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvocationError {
    /// The trailing argument was not a callback.
    #[error("the last argument of 'read' must be a callback")]
    MissingCallback,
    /// The session's scheduler has shut down.
    #[error("session runtime has stopped")]
    Stopped,
}

/// Detaches the trailing callback from the positional arguments.
///
/// # Errors
///
/// Returns [`InvocationError::MissingCallback`] when the list is empty or its
/// last element is not a callback.
pub fn split_callback(
    mut arguments: Vec<Argument>,
) -> Result<(Vec<Argument>, ReadCallback), InvocationError> {
    match arguments.pop() {
        Some(Argument::Callback(callback)) => Ok((arguments, callback)),
        _ => Err(InvocationError::MissingCallback),
    }
}
