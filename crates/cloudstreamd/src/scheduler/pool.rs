//! Named thread pools fed by a shared job channel.

use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::{SCHEDULER_TARGET, SchedulerError};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Stop,
}

/// Fixed-size pool of named threads draining one job queue.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    name: String,
    sender: flume::Sender<Message>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` threads named `{name}-{index}`.
    pub(crate) fn start(name: &str, size: NonZeroUsize) -> Result<Self, SchedulerError> {
        let (sender, receiver) = flume::unbounded::<Message>();
        let mut pool = Self {
            name: name.to_owned(),
            sender,
            threads: Vec::with_capacity(size.get()),
        };
        for index in 0..size.get() {
            let receiver = receiver.clone();
            let thread_name = format!("{name}-{index}");
            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || run_worker(&receiver));
            match spawned {
                Ok(handle) => pool.threads.push(handle),
                Err(source) => {
                    pool.shutdown();
                    return Err(SchedulerError::Spawn {
                        thread: thread_name,
                        source,
                    });
                }
            }
        }
        debug!(target: SCHEDULER_TARGET, pool = name, size = size.get(), "thread pool started");
        Ok(pool)
    }

    pub(crate) fn handle(&self) -> PoolHandle {
        PoolHandle {
            sender: self.sender.clone(),
        }
    }

    /// Stops every thread after the jobs already queued ahead of the stop
    /// messages, then joins them.
    pub(crate) fn shutdown(self) {
        for _ in &self.threads {
            // Send only fails once every receiver is gone.
            if self.sender.send(Message::Stop).is_err() {
                break;
            }
        }
        for handle in self.threads {
            if handle.join().is_err() {
                error!(target: SCHEDULER_TARGET, pool = %self.name, "pool thread panicked");
            }
        }
        debug!(target: SCHEDULER_TARGET, pool = %self.name, "thread pool stopped");
    }
}

/// Cloneable submission side of a [`WorkerPool`].
#[derive(Debug, Clone)]
pub(crate) struct PoolHandle {
    sender: flume::Sender<Message>,
}

impl PoolHandle {
    /// Queues `job` for execution.
    pub(crate) fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), SchedulerError> {
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| SchedulerError::Stopped)
    }
}

fn run_worker(receiver: &flume::Receiver<Message>) {
    while let Ok(Message::Run(job)) = receiver.recv() {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            error!(
                target: SCHEDULER_TARGET,
                panic = panic_message(payload.as_ref()),
                "scheduled job panicked"
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
