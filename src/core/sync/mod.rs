/*!
 * Coordination Primitives
 *
 * Primitives for coordinating many parallel workers against shared state:
 * - Completion barrier for waiting on N units of work
 * - Guarded counter with lock-protected read-modify-write
 * - Conserved-pair invariant monitor
 * - Cancellable periodic tasks (thread and tokio flavours)
 * - Quorum vote coordinator with early exit
 *
 * # Architecture
 *
 * Each primitive owns its lock and its state as one unit and is shared
 * through `Arc`. Locks are `parking_lot` mutexes scoped to the critical
 * section; none is held across a sleep, a callback, or another lock.
 *
 * # Waiting
 *
 * Waiters either block on a condvar signalled on every relevant state
 * change, or poll with an adaptive backoff (`StrategyType::SpinWait`).
 */

mod barrier;
mod config;
mod counter;
mod dispatch;
mod invariant;
mod periodic;
mod periodic_async;
mod quorum;
mod spinwait;

pub use barrier::CompletionBarrier;
pub use config::{
    StrategyType, SyncConfig, ENV_MAX_WAIT_MS, ENV_POLL_INTERVAL_MS, ENV_WAIT_STRATEGY,
};
pub use counter::GuardedCounter;
pub use dispatch::{dispatch_indexed, run_indexed};
pub use invariant::{ConservedPair, Direction, MonitorReport, PairSnapshot};
pub use periodic::{PeriodicTask, TaskState};
pub use periodic_async::AsyncPeriodicTask;
pub use quorum::{QuorumReport, VoteCoordinator, VoteOutcome, VoteTally};
pub use spinwait::{Backoff, BackoffPhase};
