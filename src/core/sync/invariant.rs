/*!
 * Invariant Monitor
 *
 * Two balances whose sum is conserved. A transfer debits one side and
 * credits the other inside a single critical section, so no observer that
 * takes the same lock can ever see half a transfer.
 *
 * Verification takes the lock too. A mismatch is a logic defect: it is
 * logged at error level, counted, and returned to the caller. It is never
 * retried or repaired.
 *
 * Both balances and their sum must fit in an `i64`. A transfer that would
 * leave that range is a contract violation and changes nothing.
 */

use crate::core::errors::{SyncError, SyncResult};
use crate::monitoring::span_operation;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Direction of a transfer between the two sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Debit `a`, credit `b`
    AToB,
    /// Debit `b`, credit `a`
    BToA,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::AToB => Direction::BToA,
            Direction::BToA => Direction::AToB,
        }
    }
}

/// Point-in-time copy of both balances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSnapshot {
    pub a: i64,
    pub b: i64,
}

impl PairSnapshot {
    #[inline]
    pub fn total(&self) -> i64 {
        self.a + self.b
    }
}

/// Result of a sampling window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReport {
    /// Verifications performed
    pub samples: u64,
    /// Verifications that found a broken sum
    pub violations: u64,
}

impl MonitorReport {
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

#[derive(Debug)]
struct PairState {
    a: i64,
    b: i64,
}

/// Pair of balances with a conserved sum
#[derive(Debug)]
pub struct ConservedPair {
    state: Mutex<PairState>,
    invariant_total: i64,
    violations: AtomicU64,
}

impl ConservedPair {
    /// Create a pair; the conserved total is `a + b`
    ///
    /// # Panics
    ///
    /// If `a + b` overflows. See [`try_new`](Self::try_new).
    pub fn new(a: i64, b: i64) -> Self {
        match Self::try_new(a, b) {
            Ok(pair) => pair,
            Err(e) => {
                error!(a, b, error = %e, "conserved pair rejected");
                panic!("{}", e);
            }
        }
    }

    /// Non-panicking form of [`new`](Self::new)
    pub fn try_new(a: i64, b: i64) -> SyncResult<Self> {
        let invariant_total = a.checked_add(b).ok_or_else(|| {
            SyncError::InvalidConfig(format!("balances {} and {} overflow their sum", a, b))
        })?;
        Ok(Self {
            state: Mutex::new(PairState { a, b }),
            invariant_total,
            violations: AtomicU64::new(0),
        })
    }

    /// The sum every observation must see
    #[inline]
    pub fn invariant_total(&self) -> i64 {
        self.invariant_total
    }

    /// Move one unit in `direction`
    #[inline]
    pub fn transfer(&self, direction: Direction) -> PairSnapshot {
        self.transfer_amount(direction, 1)
    }

    /// Move `amount` units in `direction` as one critical section
    ///
    /// Balances may go negative; only the sum is conserved.
    ///
    /// # Panics
    ///
    /// If either balance would overflow. The pair is left unchanged.
    pub fn transfer_amount(&self, direction: Direction, amount: i64) -> PairSnapshot {
        match self.try_transfer_amount(direction, amount) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(?direction, amount, error = %e, "transfer contract violated");
                panic!("{}", e);
            }
        }
    }

    /// Non-panicking form of [`transfer_amount`](Self::transfer_amount)
    pub fn try_transfer_amount(&self, direction: Direction, amount: i64) -> SyncResult<PairSnapshot> {
        let mut state = self.state.lock();
        let (from, to) = match direction {
            Direction::AToB => (state.a, state.b),
            Direction::BToA => (state.b, state.a),
        };
        let (from, to) = from
            .checked_sub(amount)
            .zip(to.checked_add(amount))
            .ok_or(SyncError::BalanceOverflow { amount })?;

        match direction {
            Direction::AToB => {
                state.a = from;
                state.b = to;
            }
            Direction::BToA => {
                state.b = from;
                state.a = to;
            }
        }
        Ok(PairSnapshot {
            a: state.a,
            b: state.b,
        })
    }

    /// Consistent copy of both balances
    pub fn snapshot(&self) -> PairSnapshot {
        let state = self.state.lock();
        PairSnapshot {
            a: state.a,
            b: state.b,
        }
    }

    /// Check `a + b == invariant_total` under the lock
    ///
    /// Violations are logged and counted before returning `false`.
    pub fn verify(&self) -> bool {
        self.check().is_ok()
    }

    /// Like [`verify`](Self::verify) but returns the violation
    pub fn check(&self) -> SyncResult<()> {
        let found = self.snapshot().total();
        if found == self.invariant_total {
            return Ok(());
        }

        self.violations.fetch_add(1, Ordering::Relaxed);
        error!(
            expected = self.invariant_total,
            found, "conserved-sum invariant violated"
        );
        Err(SyncError::InvariantViolated {
            expected: self.invariant_total,
            found,
        })
    }

    /// Violations observed over the pair's lifetime
    pub fn violations(&self) -> u64 {
        self.violations.load(Ordering::Relaxed)
    }

    /// Verify continuously for `window`, returning what was observed
    ///
    /// Intended to run alongside transfer workers.
    pub fn watch(&self, window: Duration) -> MonitorReport {
        let span = span_operation("invariant_watch").with_expected_duration(window);
        let start = Instant::now();
        let mut report = MonitorReport::default();

        while start.elapsed() < window {
            report.samples += 1;
            if !self.verify() {
                report.violations += 1;
            }
        }

        span.record_outcome(report);
        info!(
            samples = report.samples,
            violations = report.violations,
            total = self.invariant_total,
            "invariant sampling window closed"
        );
        report
    }

    #[cfg(test)]
    fn skew_a(&self, delta: i64) {
        self.state.lock().a += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_verify_is_idempotent_when_undisturbed() {
        let pair = ConservedPair::new(10_000, 10_000);
        for _ in 0..100 {
            assert!(pair.verify());
        }
        assert_eq!(pair.violations(), 0);
    }

    #[test]
    fn test_transfer_moves_one_unit() {
        let pair = ConservedPair::new(5, 5);
        assert_eq!(pair.transfer(Direction::AToB), PairSnapshot { a: 4, b: 6 });
        assert_eq!(pair.transfer(Direction::BToA), PairSnapshot { a: 5, b: 5 });
        assert_eq!(
            pair.transfer_amount(Direction::AToB, 8),
            PairSnapshot { a: -3, b: 13 }
        );
        assert!(pair.verify());
    }

    #[test]
    fn test_overflowing_transfer_is_rejected() {
        let pair = ConservedPair::new(i64::MAX, 0);
        assert_eq!(
            pair.try_transfer_amount(Direction::BToA, 1),
            Err(SyncError::BalanceOverflow { amount: 1 })
        );
        assert_eq!(pair.snapshot(), PairSnapshot { a: i64::MAX, b: 0 });
        assert!(pair.verify());

        assert_eq!(
            pair.transfer(Direction::AToB),
            PairSnapshot { a: i64::MAX - 1, b: 1 }
        );
    }

    #[test]
    #[should_panic(expected = "Balance overflow")]
    fn test_overflowing_transfer_panics() {
        let pair = ConservedPair::new(0, i64::MIN);
        pair.transfer(Direction::BToA);
    }

    #[test]
    fn test_overflowing_total_is_rejected() {
        assert!(matches!(
            ConservedPair::try_new(i64::MAX, 1),
            Err(SyncError::InvalidConfig(_))
        ));
        assert_eq!(ConservedPair::try_new(-5, 5).unwrap().invariant_total(), 0);
    }

    #[test]
    fn test_violation_is_reported() {
        let pair = ConservedPair::new(10, 10);
        pair.skew_a(1);

        assert!(!pair.verify());
        assert_eq!(
            pair.check(),
            Err(SyncError::InvariantViolated {
                expected: 20,
                found: 21
            })
        );
        assert_eq!(pair.violations(), 2);
    }

    #[test]
    fn test_watch_counts_violations() {
        let pair = ConservedPair::new(1, 1);
        pair.skew_a(-1);
        let report = pair.watch(Duration::from_millis(10));
        assert!(report.samples > 0);
        assert_eq!(report.samples, report.violations);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_opposing_transfers_keep_sum() {
        let pair = Arc::new(ConservedPair::new(100, 100));
        let workers: Vec<_> = [Direction::AToB, Direction::BToA]
            .into_iter()
            .map(|direction| {
                let pair = pair.clone();
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        pair.transfer(direction);
                    }
                })
            })
            .collect();

        let report = pair.watch(Duration::from_millis(50));
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(report.is_clean());
        assert_eq!(pair.snapshot(), PairSnapshot { a: 100, b: 100 });
    }
}
