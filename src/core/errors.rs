/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for coordination operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Coordination errors with serialization support
///
/// Most variants describe a broken contract (a programming defect), not a
/// recoverable runtime condition. The panicking entry points format these
/// messages before aborting the offending thread.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Completion signalled more times than registered ({registered} units registered)")]
    #[diagnostic(
        code(sync::over_signaled),
        help("Each registered unit must signal completion exactly once. Prefer CompletionToken over manual signalling.")
    )]
    OverSignaled { registered: usize },

    #[error("Registration is closed: a waiter is already blocked with {pending} units outstanding")]
    #[diagnostic(
        code(sync::registration_closed),
        help("Finish every register() call before any await_all().")
    )]
    RegistrationClosed { pending: usize },

    #[error("Invariant violated: expected total {expected}, found {found}")]
    #[diagnostic(
        code(sync::invariant_violated),
        help("A transfer mutated one side outside the critical section. This is a logic defect, not a retryable condition.")
    )]
    InvariantViolated { expected: i64, found: i64 },

    #[error("Balance overflow: moving {amount} would take a side outside the i64 range")]
    #[diagnostic(
        code(sync::balance_overflow),
        help("Both balances and their sum must stay within i64. The pair was left unchanged.")
    )]
    BalanceOverflow { amount: i64 },

    #[error("Wait timed out after {waited_ms}ms")]
    #[diagnostic(code(sync::timeout))]
    Timeout { waited_ms: u64 },

    #[error("Worker panicked: {0}")]
    #[diagnostic(
        code(sync::worker_panicked),
        help("The background worker terminated abnormally. Check logs for the panic message.")
    )]
    WorkerPanicked(String),

    #[error("Failed to spawn worker: {0}")]
    #[diagnostic(
        code(sync::spawn_failed),
        help("The OS refused to create a thread. Reduce the worker count or raise process limits.")
    )]
    SpawnFailed(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Check COORD_* environment variables.")
    )]
    InvalidConfig(String),
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::SpawnFailed(err.to_string())
    }
}

/// Render a panic payload captured from `JoinHandle::join`
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
