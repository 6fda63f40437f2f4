//! Test doubles and fixtures shared by unit and scenario tests.

pub(crate) mod callbacks;
pub(crate) mod connectors;
pub(crate) mod observer;
pub(crate) mod runtime;
pub(crate) mod sources;
pub(crate) mod world;

use std::time::{Duration, Instant};

/// How long scenario helpers wait for asynchronous events.
pub(crate) const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] passes.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
