//! Single-slot debouncing on the tokio runtime.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A scheduled task that is aborted when the handle is dropped.
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Holds at most one pending task. Scheduling a new one supersedes the old,
/// so a burst of requests runs once, `delay` after the last of them.
///
/// Must be used from within a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<TimerHandle>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        if self.pending.replace(TimerHandle(handle)).is_some() {
            log::trace!("superseded a pending task");
        }
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Applies to tasks scheduled from now on.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
}
