//! Shared world for the streaming scenarios.

use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::completion::ReadResponse;
use crate::read::{Argument, InvocationError};
use crate::session::Session;
use crate::source::SourceProvider;
use crate::transmit::{Connector, TransmitOutcome};

use super::callbacks::{Capture, Delivery, pipeline_capture, read_capture};
use super::connectors::{FailingConnector, GatedConnector, RecordingConnector};
use super::runtime::TestRuntime;

/// Writes a held consumer may still owe when a scenario ends.
const GATE_DRAIN: usize = 64;

/// The consumer endpoint scenarios stream to.
#[derive(Debug)]
pub(crate) enum Consumer {
    Recording(RecordingConnector),
    Gated(GatedConnector),
    Refusing,
}

impl Consumer {
    fn connector(&self) -> Arc<dyn Connector> {
        match self {
            Self::Recording(connector) => Arc::new(connector.clone()),
            Self::Gated(connector) => Arc::new(connector.clone()),
            Self::Refusing => Arc::new(FailingConnector),
        }
    }

    pub(crate) fn recorded(&self) -> &RecordingConnector {
        match self {
            Self::Recording(connector) => connector,
            Self::Gated(connector) => connector.recorded(),
            Self::Refusing => panic!("a refusing consumer records nothing"),
        }
    }

    pub(crate) fn gate(&self) -> &GatedConnector {
        match self {
            Self::Gated(connector) => connector,
            _ => panic!("the consumer does not hold chunks"),
        }
    }
}

/// Scenario state: one runtime, one session and whatever the steps recorded.
pub(crate) struct StreamWorld {
    pub(crate) consumer: Consumer,
    runtime: Option<TestRuntime>,
    session: Option<Session>,
    pub(crate) query_gate: Option<flume::Sender<()>>,
    pub(crate) control_gate: Option<flume::Sender<()>>,
    pending: VecDeque<Capture<ReadResponse>>,
    pub(crate) responses: Vec<Delivery<ReadResponse>>,
    pub(crate) pipeline_result: Option<Result<(), String>>,
    pub(crate) invocation: Option<Result<(), InvocationError>>,
    pub(crate) cancelled: Option<bool>,
    outcomes_seen: usize,
}

impl Default for StreamWorld {
    fn default() -> Self {
        Self {
            consumer: Consumer::Recording(RecordingConnector::new()),
            runtime: None,
            session: None,
            query_gate: None,
            control_gate: None,
            pending: VecDeque::new(),
            responses: Vec::new(),
            pipeline_result: None,
            invocation: None,
            cancelled: None,
            outcomes_seen: 0,
        }
    }
}

impl StreamWorld {
    /// The runtime, started against the chosen consumer on first use.
    pub(crate) fn runtime(&mut self) -> &mut TestRuntime {
        let connector = self.consumer.connector();
        self.runtime
            .get_or_insert_with(|| TestRuntime::start(connector))
    }

    /// Replaces the session with one over `provider`.
    pub(crate) fn open_session(&mut self, provider: impl SourceProvider + 'static) {
        let session = self.runtime().session(provider);
        self.session = Some(session);
    }

    pub(crate) fn session(&self) -> &Session {
        self.session.as_ref().expect("a session was opened")
    }

    /// Runs `create` and records either the callback result or the refusal.
    pub(crate) fn create(&mut self, pipeline: String) {
        let (callback, capture) = pipeline_capture();
        let invoked = self.session().create(pipeline, callback);
        self.record_pipeline(invoked, &capture);
    }

    pub(crate) fn parse(&mut self, pipeline: String) {
        let (callback, capture) = pipeline_capture();
        let invoked = self.session().parse(pipeline, callback);
        self.record_pipeline(invoked, &capture);
    }

    fn record_pipeline(
        &mut self,
        invoked: Result<(), InvocationError>,
        capture: &Capture<Result<(), String>>,
    ) {
        if invoked.is_ok() {
            self.pipeline_result = Some(capture.recv().value);
        }
        self.invocation = Some(invoked);
    }

    /// Issues a read to `consumer:9000` with the given positional values.
    pub(crate) fn read(&mut self, values: Vec<Value>) {
        let (callback, capture) = read_capture();
        let mut arguments: Vec<Argument> = values.into_iter().map(Argument::from).collect();
        arguments.push(Argument::from(callback));
        let invoked = self.session().read(arguments);
        if invoked.is_ok() {
            self.pending.push_back(capture);
        }
        self.invocation = Some(invoked);
    }

    /// The next read response, in the order reads were issued.
    pub(crate) fn next_response(&mut self) -> &ReadResponse {
        let capture = self
            .pending
            .pop_front()
            .expect("a read is awaiting its response");
        self.responses.push(capture.recv());
        &self.responses.last().expect("response recorded").value
    }

    /// Collects every response still outstanding.
    pub(crate) fn drain_responses(&mut self) {
        while let Some(capture) = self.pending.pop_front() {
            self.responses.push(capture.recv());
        }
    }

    /// The next transmission outcome the observer reports.
    pub(crate) fn next_outcome(&mut self) -> TransmitOutcome {
        let nth = self.outcomes_seen;
        self.outcomes_seen += 1;
        self.runtime().observer.wait_for_outcome(nth)
    }

    pub(crate) fn shutdown(&mut self) {
        self.runtime().shutdown();
    }
}

/// Positional read arguments aimed at the test consumer.
pub(crate) fn consumer_read(query: impl IntoIterator<Item = Value>) -> Vec<Value> {
    let mut values = vec![json!("consumer"), json!(9000), json!({})];
    values.extend(query);
    values
}

impl Drop for StreamWorld {
    fn drop(&mut self) {
        self.query_gate = None;
        self.control_gate = None;
        if let Consumer::Gated(gate) = &self.consumer {
            gate.release(GATE_DRAIN);
        }
        self.session = None;
        if let Some(mut runtime) = self.runtime.take() {
            runtime.shutdown();
        }
    }
}
