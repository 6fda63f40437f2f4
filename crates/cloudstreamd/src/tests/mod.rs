//! Scenario suites for the streaming daemon.

mod dispatch_behaviour;
pub(crate) mod support;
