//! Point-cloud read-and-stream daemon.
//!
//! Clients open a [`Session`] per connection, create a point source from a
//! pipeline description, then issue reads. A read runs in two phases on the
//! [`scheduler`]: the query fills a buffer, the caller learns the point and
//! byte counts, and the buffer is streamed to a consumer socket in
//! [`transmit::CHUNK_SIZE`] chunks. A pending read can be cancelled between
//! chunks.
//!
//! The binary serves sessions over JSONL; see [`DaemonMessage`] for the
//! response shapes.

pub mod completion;
mod dispatch;
pub mod observer;
mod process;
pub mod query;
pub mod read;
pub mod scheduler;
pub mod schema;
pub mod session;
pub mod source;
mod telemetry;
pub mod transmit;
mod transport;

pub use dispatch::{DaemonMessage, DispatchConnectionHandler};
pub use observer::{ReadObserver, StructuredReadObserver};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
};
pub use scheduler::{CancellationToken, Scheduler, SchedulerError, SchedulerRuntime};
pub use session::{Session, SessionError};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
