//! One-shot completion handles delivered to session callers.

use std::fmt;

/// A callback that fires at most once.
///
/// Consuming `self` on completion guarantees single delivery; dropping the
/// handle without completing it discards the callback.
pub struct Completion<T> {
    callback: Box<dyn FnOnce(T) + Send>,
}

impl<T> Completion<T> {
    pub fn new(callback: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Delivers `value` and releases the callback.
    pub fn complete(self, value: T) {
        (self.callback)(value);
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Outcome reported to a read caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResponse {
    /// The read ran and its bytes are about to stream.
    Accepted { num_points: u64, num_bytes: u64 },
    /// The read was refused or failed before streaming.
    Rejected(String),
}

/// Callback for read requests.
pub type ReadCallback = Completion<ReadResponse>;

/// Callback for pipeline creation and parsing; `Err` carries the message.
pub type PipelineCallback = Completion<Result<(), String>>;

impl Completion<ReadResponse> {
    pub fn accept(self, num_points: u64, num_bytes: u64) {
        self.complete(ReadResponse::Accepted {
            num_points,
            num_bytes,
        });
    }

    pub fn reject(self, message: impl Into<String>) {
        self.complete(ReadResponse::Rejected(message.into()));
    }
}
