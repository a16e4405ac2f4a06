/*!
 * Coordination Limits and Defaults
 *
 * Centralized location for timing thresholds and demo workload sizes.
 * Performance-critical constants are marked with [PERF].
 */

use std::time::Duration;

// =============================================================================
// WAIT STRATEGY
// =============================================================================

/// Tight-spin window before the backoff starts yielding
/// [PERF] Short enough that an uncontended wait never reaches the scheduler
pub const DEFAULT_SPIN_DURATION: Duration = Duration::from_micros(10);

/// Spin iterations before yielding
pub const DEFAULT_MAX_SPINS: u32 = 100;

/// Iterations spent yielding before the backoff starts sleeping
pub const BACKOFF_YIELD_ITERATIONS: u32 = 50;

/// Upper bound for a single backoff sleep
/// [PERF] Caps idle CPU of a spinning waiter at roughly one check per millisecond
pub const BACKOFF_MAX_SLEEP: Duration = Duration::from_millis(1);

// =============================================================================
// PERIODIC TASKS
// =============================================================================

/// Default interval between two actions of a periodic task
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// DEMO WORKLOADS
// =============================================================================

/// Workers in the fan-out demo
pub const DISPATCH_DEMO_WORKERS: usize = 5;

/// Concurrent increments in the counter demo
pub const COUNTER_DEMO_WORKERS: usize = 1000;

/// Starting balance of each side of the conserved pair
pub const INVARIANT_INITIAL_BALANCE: i64 = 10_000;

/// Transfer workers per direction
pub const INVARIANT_WORKERS_PER_DIRECTION: usize = 1000;

/// How long the invariant checker samples
pub const INVARIANT_SAMPLE_WINDOW: Duration = Duration::from_secs(1);

/// Voters in the quorum demo
pub const QUORUM_DEMO_VOTERS: usize = 10;

/// Positive votes needed to win the quorum demo
pub const QUORUM_DEMO_THRESHOLD: usize = 5;

/// How long the periodic demo runs before it is stopped
pub const PERIODIC_DEMO_RUNTIME: Duration = Duration::from_secs(5);
