//! Connectors that record, refuse or hold back transmissions.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::transmit::Connector;

#[derive(Debug, Default)]
struct Recorded {
    connections: Vec<(String, u16)>,
    writes: Vec<Vec<u8>>,
    flushed: bool,
}

/// Captures every connection and write in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingConnector {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().expect("recording connector mutex poisoned")
    }

    /// Every byte written, in order.
    pub(crate) fn bytes(&self) -> Vec<u8> {
        self.recorded().writes.concat()
    }

    /// Length of each individual write.
    pub(crate) fn write_sizes(&self) -> Vec<usize> {
        self.recorded().writes.iter().map(Vec::len).collect()
    }

    pub(crate) fn connections(&self) -> Vec<(String, u16)> {
        self.recorded().connections.clone()
    }

    pub(crate) fn flushed(&self) -> bool {
        self.recorded().flushed
    }
}

impl Connector for RecordingConnector {
    fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>> {
        self.recorded().connections.push((host.to_owned(), port));
        Ok(Box::new(RecordingSink {
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct RecordingSink {
    recorded: Arc<Mutex<Recorded>>,
}

impl Write for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.recorded
            .lock()
            .expect("recording connector mutex poisoned")
            .writes
            .push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.recorded
            .lock()
            .expect("recording connector mutex poisoned")
            .flushed = true;
        Ok(())
    }
}

/// Refuses every connection.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailingConnector;

impl Connector for FailingConnector {
    fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("connection to {host}:{port} refused"),
        ))
    }
}

/// Records like [`RecordingConnector`] but holds each write until the test
/// opens the gate.
#[derive(Debug, Clone)]
pub(crate) struct GatedConnector {
    inner: RecordingConnector,
    entered: Arc<Mutex<usize>>,
    permits: flume::Receiver<()>,
    opener: flume::Sender<()>,
}

impl GatedConnector {
    pub(crate) fn new() -> Self {
        let (opener, permits) = flume::unbounded();
        Self {
            inner: RecordingConnector::new(),
            entered: Arc::new(Mutex::new(0)),
            permits,
            opener,
        }
    }

    /// Writes that have started, including ones still held.
    pub(crate) fn entered(&self) -> usize {
        *self.entered.lock().expect("gate mutex poisoned")
    }

    /// Lets `count` more writes complete.
    pub(crate) fn release(&self, count: usize) {
        for _ in 0..count {
            self.opener.send(()).expect("gate receiver alive");
        }
    }

    pub(crate) fn recorded(&self) -> &RecordingConnector {
        &self.inner
    }
}

impl Connector for GatedConnector {
    fn connect(&self, host: &str, port: u16) -> io::Result<Box<dyn Write + Send>> {
        let sink = self.inner.connect(host, port)?;
        Ok(Box::new(GatedSink {
            sink,
            entered: Arc::clone(&self.entered),
            permits: self.permits.clone(),
        }))
    }
}

struct GatedSink {
    sink: Box<dyn Write + Send>,
    entered: Arc<Mutex<usize>>,
    permits: flume::Receiver<()>,
}

impl Write for GatedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        *self.entered.lock().expect("gate mutex poisoned") += 1;
        self.permits
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "gate closed"))?;
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
