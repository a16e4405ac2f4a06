/*!
 * RAII Resource Guards
 *
 * Scoped ownership of coordination obligations with automatic release.
 *
 * ## Design Principles
 *
 * 1. **Release exactly once**: manual `release` or `Drop`, never both
 * 2. **Observable**: guards carry metadata for logging
 * 3. **Drop never panics**: failures on the drop path are logged
 *
 * ## Guard Types
 *
 * - **CompletionToken**: one registered unit of a `CompletionBarrier`
 *
 * ## Example
 *
 * ```rust
 * use coordkit::core::sync::CompletionBarrier;
 * use std::sync::Arc;
 *
 * let barrier = Arc::new(CompletionBarrier::new());
 * let token = barrier.register_token();
 * std::thread::spawn(move || {
 *     let _token = token;
 *     // work; completion is signalled when `_token` drops
 * });
 * barrier.await_all();
 * ```
 */

mod completion;

pub use completion::CompletionToken;

/// Result type for guard operations
pub type GuardResult<T> = Result<T, GuardError>;

/// Errors that can occur during guard operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Resource already released")]
    AlreadyReleased,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Guard metadata for observability
#[derive(Debug, Clone)]
pub struct GuardMetadata {
    pub resource_type: &'static str,
    pub creation_time: std::time::Instant,
    pub worker: Option<usize>,
}

impl GuardMetadata {
    #[inline]
    pub fn new(resource_type: &'static str) -> Self {
        Self {
            resource_type,
            creation_time: std::time::Instant::now(),
            worker: None,
        }
    }

    #[inline]
    pub fn lifetime_micros(&self) -> u64 {
        self.creation_time.elapsed().as_micros() as u64
    }
}
