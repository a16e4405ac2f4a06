/*!
 * Cancellable Periodic Task
 *
 * A background thread that repeats an action at a fixed interval until it is
 * told to stop. Cancellation is cooperative: `request_stop` flips a flag
 * under a lock and returns immediately, and the loop notices the flag the
 * next time it checks.
 *
 * # States
 *
 * `Running -> StopRequested -> Stopped`, one way only.
 *
 * # Stop Latency
 *
 * The loop checks the flag, runs the action, then sleeps. A stop requested
 * after a check has passed therefore lets exactly one more action run, and
 * the loop reaches `Stopped` at most one interval (plus the running action)
 * after `request_stop` returns. Callers that need to know the task has
 * finished use `join` or `stop`.
 */

use crate::core::errors::{panic_message, SyncError, SyncResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifecycle of a periodic task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    StopRequested,
    Stopped,
}

/// Lock-protected stop flag shared by the loop and its handle
#[derive(Debug)]
pub(crate) struct TaskControl {
    state: Mutex<TaskState>,
}

impl TaskControl {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskState::Running),
        })
    }

    /// Loop-side check; a pending stop is acknowledged as `Stopped`
    pub(crate) fn should_continue(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            TaskState::Running => true,
            TaskState::StopRequested | TaskState::Stopped => {
                *state = TaskState::Stopped;
                false
            }
        }
    }

    /// Returns `true` if this call moved the task out of `Running`
    pub(crate) fn request_stop(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TaskState::Running {
            *state = TaskState::StopRequested;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_stopped(&self) {
        *self.state.lock() = TaskState::Stopped;
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.state.lock()
    }
}

/// Marks the task stopped however the loop exits, including by panic
pub(crate) struct StopOnExit(pub(crate) Arc<TaskControl>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

/// Handle to a periodic background thread
///
/// Dropping the handle without calling `stop` or `join` requests a stop and
/// detaches the thread, logging a warning.
pub struct PeriodicTask {
    name: String,
    interval: Duration,
    control: Arc<TaskControl>,
    actions: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Start running `action` every `interval`
    ///
    /// The action receives the zero-based iteration number.
    pub fn start<F>(action: F, interval: Duration) -> SyncResult<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        Self::start_named("periodic", action, interval)
    }

    /// Like [`start`](Self::start) with a thread name for logs
    pub fn start_named<F>(name: impl Into<String>, action: F, interval: Duration) -> SyncResult<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let name = name.into();
        let control = TaskControl::new();
        let actions = Arc::new(AtomicU64::new(0));

        let handle = {
            let control = control.clone();
            let actions = actions.clone();
            thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_loop(control, actions, interval, action))?
        };

        info!(task = %name, interval_ms = interval.as_millis() as u64, "periodic task started");

        Ok(Self {
            name,
            interval,
            control,
            actions,
            handle: Some(handle),
        })
    }

    /// Ask the loop to stop; does not wait for it
    ///
    /// Callable from any thread, any number of times.
    pub fn request_stop(&self) {
        if self.control.request_stop() {
            info!(task = %self.name, "periodic task stop requested");
        }
    }

    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.state() != TaskState::Running
    }

    /// Actions completed so far
    pub fn actions(&self) -> u64 {
        self.actions.load(Ordering::Acquire)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wait for the loop to exit and return the number of actions run
    ///
    /// Blocks forever unless a stop has been or will be requested.
    pub fn join(mut self) -> SyncResult<u64> {
        let Some(handle) = self.handle.take() else {
            return Ok(self.actions());
        };
        handle
            .join()
            .map_err(|payload| SyncError::WorkerPanicked(panic_message(payload.as_ref())))?;

        let actions = self.actions();
        info!(task = %self.name, actions, "periodic task stopped");
        Ok(actions)
    }

    /// Request a stop and wait for the loop to exit
    pub fn stop(self) -> SyncResult<u64> {
        self.request_stop();
        self.join()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if self.handle.take().is_some() && self.control.request_stop() {
            warn!(
                task = %self.name,
                "periodic task dropped while running; stop requested and thread detached"
            );
        }
    }
}

fn run_loop<F>(control: Arc<TaskControl>, actions: Arc<AtomicU64>, interval: Duration, mut action: F)
where
    F: FnMut(u64),
{
    let _stopped = StopOnExit(control.clone());
    let mut iteration = 0u64;

    while control.should_continue() {
        action(iteration);
        iteration += 1;
        actions.store(iteration, Ordering::Release);
        thread::sleep(interval);
    }

    debug!(iterations = iteration, "periodic loop observed stop");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_state_transitions_are_one_way() {
        let control = TaskControl::new();
        assert_eq!(control.state(), TaskState::Running);
        assert!(control.request_stop());
        assert!(!control.request_stop());
        assert_eq!(control.state(), TaskState::StopRequested);

        assert!(!control.should_continue());
        assert_eq!(control.state(), TaskState::Stopped);
        assert!(!control.request_stop());
        assert_eq!(control.state(), TaskState::Stopped);
    }

    #[test]
    fn test_runs_until_stopped() {
        let task = PeriodicTask::start(|_| {}, Duration::from_millis(5)).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(task.state(), TaskState::Running);
        let actions = task.stop().unwrap();
        assert!(actions >= 2, "expected several actions, got {}", actions);
    }

    #[test]
    fn test_iteration_numbers_are_sequential() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = {
            let seen = seen.clone();
            PeriodicTask::start(move |i| seen.lock().push(i), Duration::from_millis(2)).unwrap()
        };
        thread::sleep(Duration::from_millis(30));
        let actions = task.stop().unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len() as u64, actions);
        assert!(seen.iter().enumerate().all(|(i, v)| *v == i as u64));
    }

    #[test]
    fn test_stops_within_one_interval() {
        let interval = Duration::from_millis(50);
        let task = PeriodicTask::start(|_| {}, interval).unwrap();
        thread::sleep(Duration::from_millis(75));

        task.request_stop();
        let requested = Instant::now();
        while task.state() != TaskState::Stopped {
            assert!(requested.elapsed() < interval * 3, "task did not stop");
            thread::sleep(Duration::from_millis(1));
        }
        task.join().unwrap();
    }

    #[test]
    fn test_panicking_action_is_reported() {
        let task = PeriodicTask::start(|_| panic!("ping failed"), Duration::from_millis(1)).unwrap();
        let result = task.join();
        assert_eq!(result, Err(SyncError::WorkerPanicked("ping failed".into())));
    }

    #[test]
    fn test_drop_requests_stop() {
        let actions = Arc::new(AtomicU64::new(0));
        {
            let actions = actions.clone();
            let _task = PeriodicTask::start(
                move |_| {
                    actions.fetch_add(1, Ordering::SeqCst);
                },
                Duration::from_millis(5),
            )
            .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        thread::sleep(Duration::from_millis(30));
        let after_drop = actions.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(actions.load(Ordering::SeqCst), after_drop);
    }
}
