/*!
 * Guarded Counter
 *
 * A shared integer whose read-modify-write always happens under one
 * exclusive lock. The value lives inside the mutex, so there is no way to
 * touch it without holding the lock and lost updates cannot be expressed.
 */

use parking_lot::Mutex;

/// Monotonic counter protected by a mutex
///
/// # Performance
///
/// The lock is held only for the increment itself; callers do their I/O
/// outside of it.
#[derive(Debug, Default)]
pub struct GuardedCounter {
    value: Mutex<u64>,
}

impl GuardedCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at `initial`
    pub fn starting_at(initial: u64) -> Self {
        Self {
            value: Mutex::new(initial),
        }
    }

    /// Add one and return the new value
    #[inline]
    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Add `delta` and return the new value
    ///
    /// Saturates at `u64::MAX` so the value never decreases.
    #[inline]
    pub fn add(&self, delta: u64) -> u64 {
        let mut value = self.value.lock();
        *value = value.saturating_add(delta);
        *value
    }

    /// Current value, read under the lock
    #[inline]
    pub fn read(&self) -> u64 {
        *self.value.lock()
    }
}
