//! Cancel-and-reschedule task slot
//!
//! Holds at most one pending background task. Scheduling a new task aborts
//! the previous one, so a burst of requests inside the window runs only the
//! last. Dropping the debouncer aborts whatever is still pending.

use crate::error::{EngineError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Run `task` once the window elapses without another call
    pub fn schedule<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let window = self.window;
        self.spawn(async move {
            tokio::time::sleep(window).await;
            task.await;
        })
    }

    /// Run `task` right away, replacing anything pending
    pub fn schedule_now<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawn(task)
    }

    fn spawn<F>(&mut self, task: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;
        if self.cancel() {
            debug!("Rescheduled pending task");
        }
        self.pending = Some(handle.spawn(task));
        Ok(())
    }

    /// Abort the pending task; returns whether one was still running
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the pending task to finish
    pub async fn wait(&mut self) {
        if let Some(handle) = self.pending.take() {
            // An aborted task reports a JoinError; nothing to propagate.
            let _ = handle.await;
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
