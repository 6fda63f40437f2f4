//! Callbacks that report what they received and on which thread.

use std::sync::mpsc;
use std::thread;

use crate::completion::{PipelineCallback, ReadCallback, ReadResponse};

use super::WAIT_TIMEOUT;

/// One delivered callback value plus the name of the delivering thread.
#[derive(Debug)]
pub(crate) struct Delivery<T> {
    pub(crate) value: T,
    pub(crate) thread: Option<String>,
}

/// Receiving end of a captured callback.
#[derive(Debug)]
pub(crate) struct Capture<T> {
    receiver: mpsc::Receiver<Delivery<T>>,
}

impl<T> Capture<T> {
    /// Waits for the next delivery.
    pub(crate) fn recv(&self) -> Delivery<T> {
        self.receiver
            .recv_timeout(WAIT_TIMEOUT)
            .expect("callback should fire")
    }
}

fn capturing<T: Send + 'static>() -> (impl FnOnce(T) + Send + 'static, Capture<T>) {
    let (sender, receiver) = mpsc::channel();
    let callback = move |value: T| {
        let thread = thread::current().name().map(str::to_owned);
        // The capture may have been dropped by a finished test.
        drop(sender.send(Delivery { value, thread }));
    };
    (callback, Capture { receiver })
}

pub(crate) fn read_capture() -> (ReadCallback, Capture<ReadResponse>) {
    let (callback, capture) = capturing();
    (ReadCallback::new(callback), capture)
}

pub(crate) fn pipeline_capture() -> (PipelineCallback, Capture<Result<(), String>>) {
    let (callback, capture) = capturing();
    (PipelineCallback::new(callback), capture)
}
