//! Sessions served over a live socket listener.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use cloudstream_config::SocketEndpoint;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use crate::dispatch::DispatchConnectionHandler;
use crate::source::InlinePipelineProvider;
use crate::transmit::{Connector, TcpConnector};
use crate::transport::{ListenerHandle, SocketListener};

use super::support::connectors::RecordingConnector;
use super::support::runtime::TestRuntime;
use super::support::sources::sequential_pipeline;
use super::support::wait_until;

struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    fn connect(listener: &ListenerHandle) -> Self {
        let addr = listener.local_addr().expect("tcp listener");
        let writer = TcpStream::connect(addr).expect("connect to daemon");
        let reader = BufReader::new(writer.try_clone().expect("clone client stream"));
        Self { reader, writer }
    }

    fn request(&mut self, command: &str, arguments: Value) -> Value {
        let line = json!({"command": command, "arguments": arguments}).to_string();
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .expect("send request");
        self.response()
    }

    fn response(&mut self) -> Value {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).expect("read response");
        assert!(read > 0, "daemon closed the connection");
        serde_json::from_str(&line).expect("response is JSON")
    }

    fn create(&mut self, points: usize) {
        let response = self.request("create", json!([sequential_pipeline(points)]));
        assert_eq!(response, json!({"kind": "created", "error": null}));
    }
}

struct Daemon {
    listener: Option<ListenerHandle>,
    runtime: TestRuntime,
}

impl Daemon {
    fn start(connector: Arc<dyn Connector>) -> Self {
        let runtime = TestRuntime::start(connector);
        let handler = DispatchConnectionHandler::new(
            runtime.scheduler(),
            Arc::new(InlinePipelineProvider::new()),
        );
        let listener = SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0))
            .expect("bind listener")
            .start(Arc::new(handler))
            .expect("start listener");
        Self {
            listener: Some(listener),
            runtime,
        }
    }

    fn client(&self) -> Client {
        Client::connect(self.listener.as_ref().expect("listener running"))
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
            drop(listener.join());
        }
        self.runtime.shutdown();
    }
}

struct RecordingDaemon {
    daemon: Daemon,
    connector: RecordingConnector,
}

#[fixture]
fn recording() -> RecordingDaemon {
    let connector = RecordingConnector::new();
    RecordingDaemon {
        daemon: Daemon::start(Arc::new(connector.clone())),
        connector,
    }
}

#[rstest]
fn created_session_answers_queries(recording: RecordingDaemon) {
    let mut client = recording.daemon.client();
    client.create(12);

    assert_eq!(
        client.request("num-points", json!([])),
        json!({"kind": "num_points", "value": 12})
    );
    let schema = client.request("schema", json!([]));
    assert_eq!(schema.get("kind"), Some(&json!("schema")));
    assert_eq!(
        schema.pointer("/schema/dimensions/0/name"),
        Some(&json!("X"))
    );
}

#[rstest]
fn read_over_the_wire_streams_to_the_consumer(recording: RecordingDaemon) {
    let mut client = recording.daemon.client();
    client.create(100);

    let accepted = client.request("read", json!(["consumer", 9000, {}, 0, 10]));

    assert_eq!(
        accepted,
        json!({"kind": "accepted", "error": null, "num_points": 10, "num_bytes": 160})
    );
    assert!(wait_until(|| recording.connector.bytes().len() == 160));
    assert_eq!(
        recording.connector.connections(),
        vec![("consumer".to_owned(), 9000)]
    );
}

#[rstest]
fn connections_hold_independent_sessions(recording: RecordingDaemon) {
    let mut first = recording.daemon.client();
    let mut second = recording.daemon.client();
    first.create(5);

    assert_eq!(
        second.request("num-points", json!([])),
        json!({"kind": "error", "message": "Session not created"})
    );
    assert_eq!(
        first.request("num-points", json!([])),
        json!({"kind": "num_points", "value": 5})
    );
}

#[rstest]
fn destroyed_session_rejects_reads(recording: RecordingDaemon) {
    let mut client = recording.daemon.client();
    client.create(5);

    assert_eq!(
        client.request("destroy", json!([])),
        json!({"kind": "destroyed"})
    );
    let rejected = client.request("read", json!(["consumer", 9000, {}, 0, 1]));

    assert_eq!(
        rejected,
        json!({"kind": "rejected", "error": "Session not created"})
    );
}

#[rstest]
fn idle_cancel_reports_nothing_cancelled(recording: RecordingDaemon) {
    let mut client = recording.daemon.client();
    client.create(5);

    assert_eq!(
        client.request("cancel", json!([])),
        json!({"kind": "cancelled", "cancelled": false})
    );
}

#[test]
fn read_streams_to_a_real_tcp_consumer() {
    let consumer = TcpListener::bind("127.0.0.1:0").expect("bind consumer");
    let port = consumer.local_addr().expect("consumer address").port();
    let received = thread::spawn(move || {
        let (mut stream, _) = consumer.accept().expect("accept transmitter");
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).expect("read payload");
        bytes
    });
    let daemon = Daemon::start(Arc::new(TcpConnector::default()));
    let mut client = daemon.client();
    client.create(3000);

    let accepted = client.request("read", json!(["127.0.0.1", port, {}, 0, 3000]));

    assert_eq!(accepted.get("num_bytes"), Some(&json!(48_000)));
    let bytes = received.join().expect("consumer thread");
    assert_eq!(bytes.len(), 48_000);
    let second_x = f64::from_le_bytes(
        bytes
            .get(16..24)
            .and_then(|slice| slice.try_into().ok())
            .expect("second record"),
    );
    assert!((second_x - 1.0).abs() < f64::EPSILON);
}
