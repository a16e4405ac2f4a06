/*!
 * coordkit
 * Coordination primitives for parallel workers sharing mutable state
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{SyncError, SyncResult};
pub use crate::core::guard::CompletionToken;
pub use crate::core::sync::{
    dispatch_indexed, run_indexed, AsyncPeriodicTask, CompletionBarrier, ConservedPair,
    Direction, GuardedCounter, MonitorReport, PeriodicTask, QuorumReport, StrategyType,
    SyncConfig, TaskState, VoteCoordinator, VoteOutcome, VoteTally,
};
pub use monitoring::init_tracing;
