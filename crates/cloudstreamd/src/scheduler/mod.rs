//! Two-phase read scheduling.
//!
//! Background work runs on a worker pool. Every continuation that can reach a
//! caller callback runs on a single control thread, so callbacks are never
//! invoked from a worker. A read moves through:
//!
//! 1. phase 1 on a worker: the command queries its source into the buffer;
//! 2. on the control thread: the caller is told the counts, or the error;
//! 3. phase 2 on a worker: the buffer streams in [`CHUNK_SIZE`] chunks,
//!    checking the cancellation token before each chunk;
//! 4. on the control thread: the outcome is reported and the session's slot
//!    released.
//!
//! The command, and with it the buffer, is dropped as soon as the phase that
//! last needs it ends: right after a failed phase 1, or at the end of phase 2.

mod cancel;
mod pool;

use std::io;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::completion::ReadCallback;
use crate::observer::ReadObserver;
use crate::read::{PendingRead, ReadCommand, ReadError};
use crate::transmit::{CHUNK_SIZE, Connector, TransmitOutcome};

pub use cancel::{CancellationToken, ReadSlot, ReadState};
use pool::{PoolHandle, WorkerPool, panic_message};

pub(crate) const SCHEDULER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::scheduler");

const CONTROL_THREAD: &str = "cloudstream-control";
const WORKER_THREAD: &str = "cloudstream-worker";

/// Errors raised by the scheduler runtime.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A pool thread could not be spawned.
    #[error("failed to spawn thread {thread}: {source}")]
    Spawn {
        thread: String,
        #[source]
        source: io::Error,
    },
    /// The runtime has shut down and no longer accepts work.
    #[error("scheduler has stopped")]
    Stopped,
}

/// Background work that panicked instead of returning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown error")]
pub struct WorkPanicked;

/// Owns the control thread and the worker pool.
#[derive(Debug)]
pub struct SchedulerRuntime {
    control: WorkerPool,
    workers: WorkerPool,
    scheduler: Scheduler,
}

impl SchedulerRuntime {
    /// Starts the control thread and `workers` worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Spawn`] when a thread cannot be created.
    pub fn start(
        workers: NonZeroUsize,
        connector: Arc<dyn Connector>,
        observer: Arc<dyn ReadObserver>,
    ) -> Result<Self, SchedulerError> {
        let control = WorkerPool::start(CONTROL_THREAD, NonZeroUsize::MIN)?;
        let workers = match WorkerPool::start(WORKER_THREAD, workers) {
            Ok(workers) => workers,
            Err(error) => {
                control.shutdown();
                return Err(error);
            }
        };
        let scheduler = Scheduler {
            control: control.handle(),
            workers: workers.handle(),
            connector,
            observer,
        };
        Ok(Self {
            control,
            workers,
            scheduler,
        })
    }

    /// Cloneable handle for submitting work.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    /// Drains queued work and joins every thread.
    ///
    /// Continuations queued after the control thread stops are dropped, so
    /// callbacks still pending at that point never fire.
    pub fn shutdown(self) {
        let Self {
            control, workers, ..
        } = self;
        workers.shutdown();
        control.shutdown();
    }
}

/// Cloneable submission handle shared by sessions.
#[derive(Clone)]
pub struct Scheduler {
    control: PoolHandle,
    workers: PoolHandle,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn ReadObserver>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Runs `job` on the control thread.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stopped`] after shutdown.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> Result<(), SchedulerError> {
        self.control.submit(job)
    }

    /// Runs `work` on a worker, then hands its result to `then` on the
    /// control thread. A panic in `work` reaches `then` as [`WorkPanicked`].
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Stopped`] after shutdown.
    pub fn queue_work<T, W, C>(&self, work: W, then: C) -> Result<(), SchedulerError>
    where
        T: Send + 'static,
        W: FnOnce() -> T + Send + 'static,
        C: FnOnce(Result<T, WorkPanicked>) + Send + 'static,
    {
        let control = self.control.clone();
        self.workers.submit(move || {
            let result = catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                warn!(
                    target: SCHEDULER_TARGET,
                    panic = panic_message(payload.as_ref()),
                    "background work panicked"
                );
                WorkPanicked
            });
            if control.submit(move || then(result)).is_err() {
                warn!(target: SCHEDULER_TARGET, "control thread stopped; dropping continuation");
            }
        })
    }

    pub fn observer(&self) -> &dyn ReadObserver {
        self.observer.as_ref()
    }

    /// Starts phase 1 of `pending`. `slot` must already hold the command's
    /// token and is released once the read has fully finished.
    pub fn start_read(&self, pending: PendingRead, slot: Arc<ReadSlot>) {
        let PendingRead { command, callback } = pending;
        let token = command.token().clone();
        debug!(
            target: SCHEDULER_TARGET,
            generation = token.generation(),
            query = command.query().kind(),
            capacity = command.capacity(),
            "scheduling read"
        );

        let scheduler = self.clone();
        let release_slot = Arc::clone(&slot);
        let release_token = token.clone();
        let submitted = self.queue_work(
            move || {
                let mut command = command;
                let result = command.run();
                (command, result)
            },
            move |outcome| scheduler.finish_reading(outcome, callback, &slot, &token),
        );
        if let Err(error) = submitted {
            warn!(target: SCHEDULER_TARGET, %error, "read dropped at shutdown");
            release_slot.release(&release_token);
        }
    }

    fn finish_reading(
        &self,
        outcome: Result<(ReadCommand, Result<(), ReadError>), WorkPanicked>,
        callback: ReadCallback,
        slot: &Arc<ReadSlot>,
        token: &CancellationToken,
    ) {
        let generation = token.generation();
        let command = match outcome {
            Ok((command, Ok(()))) => command,
            Ok((command, Err(error))) => {
                drop(command);
                let message = error.to_string();
                self.observer.read_failed(generation, &message);
                callback.reject(message);
                slot.release(token);
                return;
            }
            Err(panicked) => {
                let message = panicked.to_string();
                self.observer.read_failed(generation, &message);
                callback.reject(message);
                slot.release(token);
                return;
            }
        };

        let num_bytes = command.num_bytes();
        slot.advance(token);
        self.observer
            .read_accepted(generation, command.num_points(), num_bytes);
        callback.accept(command.num_points(), num_bytes as u64);
        self.observer
            .transmit_started(generation, command.host(), command.port(), num_bytes);

        let connector = Arc::clone(&self.connector);
        let observer = Arc::clone(&self.observer);
        let finish_slot = Arc::clone(slot);
        let finish_token = token.clone();
        let submitted = self.queue_work(
            move || {
                let outcome = stream_command(&command, connector.as_ref());
                drop(command);
                outcome
            },
            move |outcome| {
                let outcome = outcome.unwrap_or_else(|panicked| TransmitOutcome::Failed {
                    sent: 0,
                    total: num_bytes,
                    error: panicked.to_string(),
                });
                observer.transmit_finished(finish_token.generation(), &outcome);
                finish_slot.release(&finish_token);
            },
        );
        if let Err(error) = submitted {
            warn!(target: SCHEDULER_TARGET, %error, "transmission dropped at shutdown");
            slot.release(token);
        }
    }
}

/// Phase 2: connects and streams the command's payload chunk by chunk.
fn stream_command(command: &ReadCommand, connector: &dyn Connector) -> TransmitOutcome {
    let total = command.num_bytes();
    let token = command.token();
    let mut transmitter = match command.transmitter(connector) {
        Ok(transmitter) => transmitter,
        Err(error) => {
            return TransmitOutcome::Failed {
                sent: 0,
                total,
                error: error.to_string(),
            };
        }
    };

    let mut offset = 0;
    while offset < total {
        if token.is_cancelled() {
            return TransmitOutcome::Cancelled {
                sent: offset,
                total,
            };
        }
        let length = CHUNK_SIZE.min(total - offset);
        if let Err(error) = transmitter.transmit(offset, length) {
            return TransmitOutcome::Failed {
                sent: offset,
                total,
                error: error.to_string(),
            };
        }
        offset += length;
    }

    match transmitter.finish() {
        Ok(()) => TransmitOutcome::Completed { bytes: total },
        Err(error) => TransmitOutcome::Failed {
            sent: total,
            total,
            error: error.to_string(),
        },
    }
}
