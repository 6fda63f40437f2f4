//! Request deserialization for the dispatch loop.

use serde::Deserialize;
use serde_json::Value;

use super::errors::DispatchError;

/// Parsed request line.
///
/// `arguments` is forwarded positionally to the named session operation.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub command: String,
    #[serde(default)]
    pub arguments: Vec<Value>,
}

impl SessionRequest {
    /// Parses a JSONL line into a request.
    ///
    /// Trailing whitespace (including the newline delimiter) is trimmed before
    /// parsing.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::MalformedJsonl` if the line is empty or cannot
    /// be parsed as a `SessionRequest`.
    pub fn parse(line: &[u8]) -> Result<Self, DispatchError> {
        let trimmed = trim_trailing_whitespace(line);
        if trimmed.is_empty() {
            return Err(DispatchError::malformed("empty request line"));
        }

        serde_json::from_slice(trimmed).map_err(DispatchError::from_json_error)
    }

    /// Validates that the command name is present.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::InvalidStructure` if the command field is empty
    /// or contains only whitespace.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.command.trim().is_empty() {
            return Err(DispatchError::invalid_structure("command field is empty"));
        }
        Ok(())
    }

    /// Returns the trimmed command name.
    pub fn command(&self) -> &str {
        self.command.trim()
    }
}

/// Trims trailing ASCII whitespace from a byte slice.
fn trim_trailing_whitespace(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    bytes.get(..end).unwrap_or_default()
}
