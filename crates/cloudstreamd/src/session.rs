//! A client's view of one opened point source and its current read.

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::debug;

use crate::completion::PipelineCallback;
use crate::read::{self, Argument, InvocationError, split_callback};
use crate::scheduler::{ReadSlot, ReadState, Scheduler};
use crate::source::{PointSource, SourceProvider};

const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Reported when a read arrives while another is outstanding.
pub const READ_IN_PROGRESS: &str = "Read already in progress";

/// Errors returned by synchronous session queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not created")]
    NotCreated,
}

type SharedSource = Arc<RwLock<Option<Arc<dyn PointSource>>>>;

/// Holds at most one opened source and at most one outstanding read.
///
/// Pipeline work runs on the scheduler's workers; callbacks fire on its
/// control thread. Dropping or destroying a session does not interrupt an
/// in-flight read, which keeps its own handle on the source.
pub struct Session {
    scheduler: Scheduler,
    provider: Arc<dyn SourceProvider>,
    source: SharedSource,
    slot: Arc<ReadSlot>,
}

impl Session {
    #[must_use]
    pub fn new(scheduler: Scheduler, provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            scheduler,
            provider,
            source: Arc::new(RwLock::new(None)),
            slot: Arc::new(ReadSlot::new()),
        }
    }

    /// Opens and executes `pipeline`, replacing any current source.
    ///
    /// `callback` receives `Ok(())` or the failure message.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Stopped`] when the scheduler has shut down.
    pub fn create(
        &self,
        pipeline: String,
        callback: PipelineCallback,
    ) -> Result<(), InvocationError> {
        let provider = Arc::clone(&self.provider);
        let source = Arc::clone(&self.source);
        self.scheduler
            .queue_work(
                move || provider.open(&pipeline),
                move |opened| {
                    let result = match opened {
                        Ok(Ok(opened)) => {
                            debug!(
                                target: SESSION_TARGET,
                                num_points = opened.num_points(),
                                "pipeline opened"
                            );
                            *source.write().unwrap_or_else(PoisonError::into_inner) =
                                Some(opened);
                            Ok(())
                        }
                        Ok(Err(error)) => Err(error.to_string()),
                        Err(panicked) => Err(panicked.to_string()),
                    };
                    callback.complete(result);
                },
            )
            .map_err(|_| InvocationError::Stopped)
    }

    /// Validates `pipeline` without executing it. The session holds no
    /// source once validation succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::Stopped`] when the scheduler has shut down.
    pub fn parse(
        &self,
        pipeline: String,
        callback: PipelineCallback,
    ) -> Result<(), InvocationError> {
        let provider = Arc::clone(&self.provider);
        let source = Arc::clone(&self.source);
        self.scheduler
            .queue_work(
                move || provider.validate(&pipeline),
                move |validated| {
                    let result = match validated {
                        Ok(Ok(())) => {
                            *source.write().unwrap_or_else(PoisonError::into_inner) = None;
                            Ok(())
                        }
                        Ok(Err(error)) => Err(error.to_string()),
                        Err(panicked) => Err(panicked.to_string()),
                    };
                    callback.complete(result);
                },
            )
            .map_err(|_| InvocationError::Stopped)
    }

    /// Releases the current source.
    pub fn destroy(&self) {
        *self.source.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn current_source(&self) -> Option<Arc<dyn PointSource>> {
        self.source
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total points of the current source.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotCreated`] without an open source.
    pub fn num_points(&self) -> Result<u64, SessionError> {
        self.current_source()
            .map(|source| source.num_points())
            .ok_or(SessionError::NotCreated)
    }

    /// Native schema of the current source as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotCreated`] without an open source.
    pub fn schema(&self) -> Result<String, SessionError> {
        self.current_source()
            .map(|source| source.schema_json())
            .ok_or(SessionError::NotCreated)
    }

    /// Starts a read. The last argument must be the callback; everything
    /// else, including validation failures, is answered through it on the
    /// control thread.
    ///
    /// The read is outstanding as soon as this returns, so a following
    /// [`cancel`](Self::cancel) always reaches it.
    ///
    /// # Errors
    ///
    /// Returns [`InvocationError::MissingCallback`] when the trailing
    /// argument is not a callback, and [`InvocationError::Stopped`] when the
    /// scheduler has shut down.
    pub fn read(&self, arguments: Vec<Argument>) -> Result<(), InvocationError> {
        let (positional, callback) = split_callback(arguments)?;
        let current = self.current_source();
        let claimed = current.as_ref().and_then(|_| self.slot.begin());
        let scheduler = self.scheduler.clone();
        let slot = Arc::clone(&self.slot);
        let token = claimed.clone();

        let posted = self.scheduler.post(move || {
            let Some(current) = current else {
                let reason = SessionError::NotCreated.to_string();
                scheduler.observer().read_rejected(&reason);
                callback.reject(reason);
                return;
            };
            let Some(token) = token else {
                scheduler.observer().read_rejected(READ_IN_PROGRESS);
                callback.reject(READ_IN_PROGRESS);
                return;
            };

            let rejected_token = token.clone();
            match read::create_with(&positional, callback, current, token) {
                Some(pending) => scheduler.start_read(pending, slot),
                None => {
                    slot.release(&rejected_token);
                }
            }
        });
        if posted.is_err() {
            if let Some(token) = &claimed {
                self.slot.release(token);
            }
            return Err(InvocationError::Stopped);
        }
        Ok(())
    }

    /// Marks the outstanding read for cancellation.
    ///
    /// Returns `false` when no read is outstanding.
    pub fn cancel(&self) -> bool {
        let cancelled = self.slot.cancel();
        debug!(target: SESSION_TARGET, cancelled, "cancel requested");
        cancelled
    }

    /// Lifecycle position of the current read.
    #[must_use]
    pub fn read_state(&self) -> ReadState {
        self.slot.state()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("read_state", &self.read_state())
            .finish_non_exhaustive()
    }
}
