/*!
 * Completion Barrier
 *
 * Lets a coordinator block until N independently started units of work
 * finish. Units are registered up front, each signals completion exactly
 * once, and `await_all` parks on a condvar until the outstanding count
 * reaches zero.
 *
 * # Contract
 *
 * - Every `register` happens before the first `await_all`; registering
 *   afterwards is a contract violation.
 * - Signalling more completions than were registered is a contract
 *   violation and panics instead of corrupting the count.
 * - Units should hold a [`CompletionToken`](crate::core::guard::CompletionToken)
 *   so completion is signalled even when their work panics.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::core::guard::CompletionToken;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

#[derive(Debug, Default)]
struct BarrierState {
    registered: usize,
    outstanding: usize,
    closed: bool,
}

/// Countdown barrier for a fixed set of work units
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    state: Mutex<BarrierState>,
    all_done: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Barrier with `n` units already registered
    pub fn with_units(n: usize) -> Self {
        let barrier = Self::new();
        barrier.register(n);
        barrier
    }

    /// Record `n` more outstanding units
    ///
    /// # Panics
    ///
    /// Panics if a waiter has already called `await_all`.
    pub fn register(&self, n: usize) {
        if let Err(e) = self.try_register(n) {
            error!(error = %e, "barrier contract violated");
            panic!("{}", e);
        }
    }

    /// Non-panicking form of [`register`](Self::register)
    pub fn try_register(&self, n: usize) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SyncError::RegistrationClosed {
                pending: state.outstanding,
            });
        }
        state.registered += n;
        state.outstanding += n;
        Ok(())
    }

    /// Register one unit and hand back the guard that completes it
    pub fn register_token(self: &Arc<Self>) -> CompletionToken {
        self.register(1);
        CompletionToken::new(Arc::clone(self))
    }

    /// Mark one registered unit as finished
    ///
    /// # Panics
    ///
    /// Panics if every registered unit has already signalled.
    pub fn signal_done(&self) {
        if let Err(e) = self.try_signal_done() {
            error!(error = %e, "barrier contract violated");
            panic!("{}", e);
        }
    }

    /// Non-panicking form of [`signal_done`](Self::signal_done)
    ///
    /// Returns the number of units still outstanding.
    pub fn try_signal_done(&self) -> SyncResult<usize> {
        let mut state = self.state.lock();
        if state.outstanding == 0 {
            return Err(SyncError::OverSignaled {
                registered: state.registered,
            });
        }
        state.outstanding -= 1;
        let remaining = state.outstanding;
        drop(state);

        if remaining == 0 {
            debug!("all registered units completed, releasing waiters");
            self.all_done.notify_all();
        }
        Ok(remaining)
    }

    /// Block until every registered unit has signalled
    ///
    /// Closes registration. Returns immediately when nothing is outstanding.
    pub fn await_all(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        while state.outstanding > 0 {
            self.all_done.wait(&mut state);
        }
    }

    /// Like [`await_all`](Self::await_all) but gives up after `timeout`
    pub fn await_all_timeout(&self, timeout: Duration) -> SyncResult<()> {
        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = self.state.lock();
        state.closed = true;
        while state.outstanding > 0 {
            if self.all_done.wait_until(&mut state, deadline).timed_out() && state.outstanding > 0 {
                return Err(SyncError::Timeout {
                    waited_ms: start.elapsed().as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    /// Units registered but not yet signalled
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Total units registered over the barrier's lifetime
    pub fn registered(&self) -> usize {
        self.state.lock().registered
    }

    /// Whether a waiter has closed registration
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_await_with_nothing_registered() {
        let barrier = CompletionBarrier::new();
        barrier.await_all();
        assert!(barrier.is_closed());
    }

    #[test]
    fn test_countdown() {
        let barrier = CompletionBarrier::with_units(3);
        assert_eq!(barrier.try_signal_done().unwrap(), 2);
        assert_eq!(barrier.try_signal_done().unwrap(), 1);
        assert_eq!(barrier.try_signal_done().unwrap(), 0);
        assert_eq!(barrier.outstanding(), 0);
        assert_eq!(barrier.registered(), 3);
    }

    #[test]
    fn test_over_signal_is_rejected() {
        let barrier = CompletionBarrier::with_units(1);
        barrier.signal_done();
        assert_eq!(
            barrier.try_signal_done(),
            Err(SyncError::OverSignaled { registered: 1 })
        );
        // Count must not wrap
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    #[should_panic(expected = "more times than registered")]
    fn test_over_signal_panics() {
        let barrier = CompletionBarrier::with_units(0);
        barrier.signal_done();
    }

    #[test]
    fn test_register_after_await_is_rejected() {
        let barrier = CompletionBarrier::new();
        barrier.await_all();
        assert!(matches!(
            barrier.try_register(1),
            Err(SyncError::RegistrationClosed { pending: 0 })
        ));
    }

    #[test]
    fn test_timeout_while_outstanding() {
        let barrier = CompletionBarrier::with_units(1);
        let result = barrier.await_all_timeout(Duration::from_millis(30));
        assert!(matches!(result, Err(SyncError::Timeout { .. })));
        assert_eq!(barrier.outstanding(), 1);
    }

    #[test]
    fn test_release_from_other_thread() {
        let barrier = Arc::new(CompletionBarrier::with_units(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(20));
                    barrier.signal_done();
                })
            })
            .collect();

        barrier.await_all_timeout(Duration::from_secs(5)).unwrap();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
