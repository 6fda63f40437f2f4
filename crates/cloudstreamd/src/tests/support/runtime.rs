//! A scheduler runtime wired to test doubles.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::scheduler::{Scheduler, SchedulerRuntime};
use crate::session::Session;
use crate::source::SourceProvider;
use crate::transmit::Connector;

use super::observer::RecordingObserver;

/// Owns a running scheduler and shuts it down on drop.
pub(crate) struct TestRuntime {
    runtime: Option<SchedulerRuntime>,
    pub(crate) observer: Arc<RecordingObserver>,
}

impl TestRuntime {
    pub(crate) fn start(connector: Arc<dyn Connector>) -> Self {
        Self::with_workers(connector, 2)
    }

    pub(crate) fn with_workers(connector: Arc<dyn Connector>, workers: usize) -> Self {
        let observer = Arc::new(RecordingObserver::default());
        let runtime = SchedulerRuntime::start(
            NonZeroUsize::new(workers).expect("non-zero workers"),
            connector,
            Arc::clone(&observer) as Arc<dyn crate::observer::ReadObserver>,
        )
        .expect("start scheduler");
        Self {
            runtime: Some(runtime),
            observer,
        }
    }

    pub(crate) fn scheduler(&self) -> Scheduler {
        self.runtime
            .as_ref()
            .expect("runtime running")
            .scheduler()
    }

    pub(crate) fn session(&self, provider: impl SourceProvider + 'static) -> Session {
        Session::new(self.scheduler(), Arc::new(provider))
    }

    /// Stops the runtime now instead of at drop.
    pub(crate) fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown();
        }
    }
}

impl Drop for TestRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}
