/*!
 * Async Periodic Task
 *
 * Tokio counterpart of [`PeriodicTask`](super::PeriodicTask) with the same
 * polled stop flag and the same one-more-action latency.
 *
 * # Graceful-with-Fallback Shutdown
 *
 * 1. **Preferred:** `shutdown().await` requests a stop and awaits the task.
 * 2. **Fallback:** dropping the handle aborts the task and logs a warning.
 */

use super::periodic::{StopOnExit, TaskControl, TaskState};
use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a periodic tokio task
pub struct AsyncPeriodicTask {
    control: Arc<TaskControl>,
    actions: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl AsyncPeriodicTask {
    /// Spawn `action` on the current tokio runtime, repeating every `interval`
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(mut action: F, interval: Duration) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        let control = TaskControl::new();
        let actions = Arc::new(AtomicU64::new(0));

        let handle = {
            let control = control.clone();
            let actions = actions.clone();
            tokio::spawn(async move {
                let _stopped = StopOnExit(control.clone());
                let mut iteration = 0u64;

                while control.should_continue() {
                    action(iteration);
                    iteration += 1;
                    actions.store(iteration, Ordering::Release);
                    tokio::time::sleep(interval).await;
                }

                debug!(iterations = iteration, "async periodic loop observed stop");
            })
        };

        info!(interval_ms = interval.as_millis() as u64, "async periodic task spawned");

        Self {
            control,
            actions,
            handle: Some(handle),
        }
    }

    /// Ask the loop to stop; does not wait for it
    pub fn request_stop(&self) {
        self.control.request_stop();
    }

    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Actions completed so far
    pub fn actions(&self) -> u64 {
        self.actions.load(Ordering::Acquire)
    }

    /// Request a stop and await the loop, returning the number of actions run
    pub async fn shutdown(mut self) -> SyncResult<u64> {
        self.control.request_stop();

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .map_err(|e| SyncError::WorkerPanicked(format!("task join error: {}", e)))?;
        }

        let actions = self.actions();
        info!(actions, "async periodic task shutdown complete");
        Ok(actions)
    }
}

impl Drop for AsyncPeriodicTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                self.control.request_stop();
                handle.abort();
                warn!("async periodic task dropped without shutdown; aborted");
            }
        }
    }
}
