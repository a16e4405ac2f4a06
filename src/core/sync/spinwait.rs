/*!
 * Adaptive Spin-Wait Backoff
 *
 * Used by waiters that poll a lock-protected condition instead of blocking.
 * Each call to [`Backoff::snooze`] escalates through three phases:
 *
 * 1. **Tight spin phase** (first `max_spins` iterations or `spin_duration`): `spin_loop()` hint
 * 2. **Yield phase** (next 50 iterations): `yield_now()` every iteration
 * 3. **Park phase**: exponentially increasing sleep, capped at 1ms
 *
 * The cap keeps a waiter that never sees its condition from pinning a core.
 */

use super::config::SyncConfig;
use crate::core::limits::{BACKOFF_MAX_SLEEP, BACKOFF_YIELD_ITERATIONS};
use std::thread;
use std::time::{Duration, Instant};

/// Which phase the last `snooze` used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPhase {
    Spin,
    Yield,
    Park,
}

/// Three-phase exponential backoff for polling loops
#[derive(Debug)]
pub struct Backoff {
    started: Instant,
    step: u32,
    backoff_ns: u64,
    spin_duration: Duration,
    max_spins: u32,
}

impl Backoff {
    /// Create a backoff with explicit spin limits
    pub fn new(spin_duration: Duration, max_spins: u32) -> Self {
        Self {
            started: Instant::now(),
            step: 0,
            backoff_ns: 1,
            spin_duration,
            max_spins,
        }
    }

    /// Create a backoff from the spin limits of a config
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.spin_duration, config.max_spins)
    }

    /// Number of snoozes so far
    #[inline]
    pub fn steps(&self) -> u32 {
        self.step
    }

    fn phase(&self) -> BackoffPhase {
        let spinning = self.step < self.max_spins && self.started.elapsed() < self.spin_duration;
        if spinning {
            BackoffPhase::Spin
        } else if self.step < self.max_spins.saturating_add(BACKOFF_YIELD_ITERATIONS) {
            BackoffPhase::Yield
        } else {
            BackoffPhase::Park
        }
    }

    /// Wait a little before the caller re-checks its condition
    pub fn snooze(&mut self) -> BackoffPhase {
        let phase = self.phase();
        match phase {
            BackoffPhase::Spin => std::hint::spin_loop(),
            BackoffPhase::Yield => thread::yield_now(),
            BackoffPhase::Park => {
                thread::sleep(Duration::from_nanos(self.backoff_ns));
                self.backoff_ns = (self.backoff_ns * 2).min(BACKOFF_MAX_SLEEP.as_nanos() as u64);
            }
        }
        self.step = self.step.saturating_add(1);
        phase
    }

}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phases_escalate() {
        let mut backoff = Backoff::new(Duration::from_secs(10), 3);
        for _ in 0..3 {
            assert_eq!(backoff.snooze(), BackoffPhase::Spin);
        }
        assert_eq!(backoff.snooze(), BackoffPhase::Yield);

        for _ in 0..BACKOFF_YIELD_ITERATIONS {
            backoff.snooze();
        }
        assert_eq!(backoff.snooze(), BackoffPhase::Park);
    }

    #[test]
    fn test_park_sleep_is_capped() {
        let mut backoff = Backoff::new(Duration::ZERO, 0);
        for _ in 0..(BACKOFF_YIELD_ITERATIONS + 40) {
            backoff.snooze();
        }
        assert!(backoff.backoff_ns <= BACKOFF_MAX_SLEEP.as_nanos() as u64);

        let start = Instant::now();
        backoff.snooze();
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
