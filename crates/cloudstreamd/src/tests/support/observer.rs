//! Test double for [`ReadObserver`] that records lifecycle events.

use std::sync::Mutex;

use crate::observer::ReadObserver;
use crate::transmit::TransmitOutcome;

use super::wait_until;

/// Read lifecycle events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadEvent {
    Rejected(String),
    Accepted {
        generation: u64,
        num_points: u64,
        num_bytes: usize,
    },
    Failed {
        generation: u64,
        error: String,
    },
    TransmitStarted {
        generation: u64,
        host: String,
        port: u16,
        num_bytes: usize,
    },
    TransmitFinished {
        generation: u64,
        outcome: TransmitOutcome,
    },
}

/// Records read events for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<ReadEvent>>,
}

impl RecordingObserver {
    /// Captures a copy of the recorded events.
    pub(crate) fn events(&self) -> Vec<ReadEvent> {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .clone()
    }

    fn record(&self, event: ReadEvent) {
        self.events
            .lock()
            .expect("observer mutex poisoned")
            .push(event);
    }

    /// Waits for the `nth` (zero-based) finished transmission.
    pub(crate) fn wait_for_outcome(&self, nth: usize) -> TransmitOutcome {
        let mut outcome = None;
        let found = wait_until(|| {
            outcome = self
                .events()
                .into_iter()
                .filter_map(|event| match event {
                    ReadEvent::TransmitFinished { outcome, .. } => Some(outcome),
                    _ => None,
                })
                .nth(nth);
            outcome.is_some()
        });
        assert!(found, "transmission {nth} should finish");
        outcome.expect("outcome recorded")
    }

    /// Waits until `predicate` matches a recorded event.
    pub(crate) fn wait_for(&self, predicate: impl Fn(&ReadEvent) -> bool) -> bool {
        wait_until(|| self.events().iter().any(&predicate))
    }
}

impl ReadObserver for RecordingObserver {
    fn read_rejected(&self, reason: &str) {
        self.record(ReadEvent::Rejected(reason.to_owned()));
    }

    fn read_accepted(&self, generation: u64, num_points: u64, num_bytes: usize) {
        self.record(ReadEvent::Accepted {
            generation,
            num_points,
            num_bytes,
        });
    }

    fn read_failed(&self, generation: u64, error: &str) {
        self.record(ReadEvent::Failed {
            generation,
            error: error.to_owned(),
        });
    }

    fn transmit_started(&self, generation: u64, host: &str, port: u16, num_bytes: usize) {
        self.record(ReadEvent::TransmitStarted {
            generation,
            host: host.to_owned(),
            port,
            num_bytes,
        });
    }

    fn transmit_finished(&self, generation: u64, outcome: &TransmitOutcome) {
        self.record(ReadEvent::TransmitFinished {
            generation,
            outcome: outcome.clone(),
        });
    }
}
