/*!
 * Core Module
 * Coordination primitives, guards, and error handling
 */

pub mod errors;
pub mod guard;
pub mod limits;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use guard::{CompletionToken, GuardError, GuardMetadata, GuardResult};
