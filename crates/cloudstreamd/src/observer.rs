//! Structured reporting for read lifecycle events.

use std::sync::Arc;

use crate::transmit::TransmitOutcome;

const OBSERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reads");

/// Observer trait used to surface read lifecycle events to telemetry sinks.
pub trait ReadObserver: Send + Sync {
    /// Invoked when a read request is refused before any work is scheduled.
    fn read_rejected(&self, reason: &str);

    /// Invoked after phase 1 filled the buffer.
    fn read_accepted(&self, generation: u64, num_points: u64, num_bytes: usize);

    /// Invoked when phase 1 fails.
    fn read_failed(&self, generation: u64, error: &str);

    /// Invoked before phase 2 connects to the consumer.
    fn transmit_started(&self, generation: u64, host: &str, port: u16, num_bytes: usize);

    /// Invoked once phase 2 has ended, whatever the outcome.
    fn transmit_finished(&self, generation: u64, outcome: &TransmitOutcome);
}

impl<T> ReadObserver for Arc<T>
where
    T: ReadObserver + ?Sized,
{
    fn read_rejected(&self, reason: &str) {
        (**self).read_rejected(reason);
    }

    fn read_accepted(&self, generation: u64, num_points: u64, num_bytes: usize) {
        (**self).read_accepted(generation, num_points, num_bytes);
    }

    fn read_failed(&self, generation: u64, error: &str) {
        (**self).read_failed(generation, error);
    }

    fn transmit_started(&self, generation: u64, host: &str, port: u16, num_bytes: usize) {
        (**self).transmit_started(generation, host, port, num_bytes);
    }

    fn transmit_finished(&self, generation: u64, outcome: &TransmitOutcome) {
        (**self).transmit_finished(generation, outcome);
    }
}

/// Default observer that records read events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredReadObserver;

impl StructuredReadObserver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ReadObserver for StructuredReadObserver {
    fn read_rejected(&self, reason: &str) {
        tracing::info!(
            target: OBSERVER_TARGET,
            event = "read_rejected",
            reason,
            "read request rejected"
        );
    }

    fn read_accepted(&self, generation: u64, num_points: u64, num_bytes: usize) {
        tracing::info!(
            target: OBSERVER_TARGET,
            event = "read_accepted",
            generation,
            num_points,
            num_bytes,
            "read accepted"
        );
    }

    fn read_failed(&self, generation: u64, error: &str) {
        tracing::warn!(
            target: OBSERVER_TARGET,
            event = "read_failed",
            generation,
            error,
            "read failed"
        );
    }

    fn transmit_started(&self, generation: u64, host: &str, port: u16, num_bytes: usize) {
        tracing::debug!(
            target: OBSERVER_TARGET,
            event = "transmit_started",
            generation,
            host,
            port,
            num_bytes,
            "transmission starting"
        );
    }

    fn transmit_finished(&self, generation: u64, outcome: &TransmitOutcome) {
        match outcome {
            TransmitOutcome::Completed { bytes } => tracing::info!(
                target: OBSERVER_TARGET,
                event = "transmit_completed",
                generation,
                bytes,
                "transmission completed"
            ),
            TransmitOutcome::Cancelled { sent, total } => tracing::info!(
                target: OBSERVER_TARGET,
                event = "transmit_cancelled",
                generation,
                sent,
                total,
                "transmission cancelled"
            ),
            TransmitOutcome::Failed { sent, total, error } => tracing::error!(
                target: OBSERVER_TARGET,
                event = "transmit_failed",
                generation,
                sent,
                total,
                error = %error,
                "transmission failed"
            ),
        }
    }
}
