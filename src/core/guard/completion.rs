/*!
 * Completion Token
 *
 * Guard for one registered unit of a completion barrier
 */

use super::{GuardError, GuardMetadata, GuardResult};
use crate::core::sync::CompletionBarrier;
use std::sync::Arc;
use tracing::{debug, error};

/// Signals its barrier exactly once, on `release` or on drop
///
/// Dropping the token during a panic still counts the unit as finished, so a
/// failing worker cannot leave the coordinator blocked forever.
///
/// # Example
///
/// ```ignore
/// let token = barrier.register_token();
/// thread::spawn(move || {
///     let _token = token;
///     do_work(); // barrier signalled even if this panics
/// });
/// ```
pub struct CompletionToken {
    barrier: Option<Arc<CompletionBarrier>>,
    metadata: GuardMetadata,
}

impl CompletionToken {
    /// Wrap a unit that is already registered on `barrier`
    pub fn new(barrier: Arc<CompletionBarrier>) -> Self {
        Self {
            barrier: Some(barrier),
            metadata: GuardMetadata::new("completion_token"),
        }
    }

    /// Tag the token with the index of the worker holding it
    pub fn for_worker(mut self, worker: usize) -> Self {
        self.metadata.worker = Some(worker);
        self
    }

    /// Signal completion now instead of at drop
    pub fn complete(mut self) -> GuardResult<()> {
        self.release()
    }

    pub fn metadata(&self) -> &GuardMetadata {
        &self.metadata
    }

    /// Whether the unit is still owed to the barrier
    #[inline]
    pub fn is_active(&self) -> bool {
        self.barrier.is_some()
    }

    /// Signal the barrier; a second call returns `AlreadyReleased`
    pub fn release(&mut self) -> GuardResult<()> {
        let barrier = self.barrier.take().ok_or(GuardError::AlreadyReleased)?;
        let remaining = barrier
            .try_signal_done()
            .map_err(|e| GuardError::OperationFailed(e.to_string()))?;

        debug!(
            resource = self.metadata.resource_type,
            worker = ?self.metadata.worker,
            held_us = self.metadata.lifetime_micros(),
            remaining,
            "unit completed"
        );
        Ok(())
    }
}

impl Drop for CompletionToken {
    fn drop(&mut self) {
        if !self.is_active() {
            return;
        }
        // Never panic here: this also runs while a worker unwinds.
        if let Err(e) = self.release() {
            error!(
                worker = ?self.metadata.worker,
                held_us = self.metadata.lifetime_micros(),
                error = %e,
                "completion token could not signal its barrier"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drop_signals_once() {
        let barrier = Arc::new(CompletionBarrier::new());
        let token = barrier.register_token();
        assert_eq!(barrier.outstanding(), 1);
        drop(token);
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_for_worker_tags_token() {
        let barrier = Arc::new(CompletionBarrier::new());
        let token = barrier.register_token().for_worker(7);
        assert_eq!(token.metadata().worker, Some(7));
        assert_eq!(token.metadata().resource_type, "completion_token");
        assert!(token.is_active());

        drop(token);
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_manual_release_then_drop() {
        let barrier = Arc::new(CompletionBarrier::new());
        let mut token = barrier.register_token().for_worker(3);
        assert_eq!(token.metadata().worker, Some(3));

        token.release().unwrap();
        assert!(!token.is_active());
        assert_eq!(token.release(), Err(GuardError::AlreadyReleased));
        drop(token);
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_panicking_worker_still_completes() {
        let barrier = Arc::new(CompletionBarrier::new());
        let token = barrier.register_token().for_worker(0);

        let handle = thread::spawn(move || {
            let _token = token;
            panic!("worker failed");
        });

        assert!(handle.join().is_err());
        barrier.await_all();
        assert_eq!(barrier.outstanding(), 0);
    }

    #[test]
    fn test_unregistered_token_reports_failure() {
        let barrier = Arc::new(CompletionBarrier::new());
        let token = CompletionToken::new(barrier.clone());
        assert!(matches!(
            token.complete(),
            Err(GuardError::OperationFailed(_))
        ));
    }
}
