/*!
 * Indexed Worker Dispatch
 *
 * Fans a unit of work out to N threads. Each worker receives its own index
 * as an argument at spawn time and holds a `CompletionToken`, so the
 * returned barrier is released even if some workers panic.
 */

use super::barrier::CompletionBarrier;
use crate::core::errors::SyncResult;
use crate::core::guard::CompletionToken;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

/// Spawn `count` workers running `work(index)` and return their barrier
///
/// If a spawn fails, the units that never started are released, the ones
/// already running are awaited, and the spawn error is returned.
pub fn dispatch_indexed<F>(count: usize, work: F) -> SyncResult<Arc<CompletionBarrier>>
where
    F: Fn(usize) + Send + Sync + 'static,
{
    let barrier = Arc::new(CompletionBarrier::with_units(count));
    let work = Arc::new(work);

    for index in 0..count {
        let token = CompletionToken::new(barrier.clone()).for_worker(index);
        let work = work.clone();

        let spawned = thread::Builder::new()
            .name(format!("worker-{}", index))
            .spawn(move || {
                let _token = token;
                (*work)(index);
            });

        if let Err(e) = spawned {
            error!(index, count, error = %e, "worker spawn failed");
            for _ in (index + 1)..count {
                barrier.signal_done();
            }
            barrier.await_all();
            return Err(e.into());
        }
    }

    debug!(count, "workers dispatched");
    Ok(barrier)
}

/// Spawn `count` workers running `work(index)` and wait for all of them
pub fn run_indexed<F>(count: usize, work: F) -> SyncResult<()>
where
    F: Fn(usize) + Send + Sync + 'static,
{
    dispatch_indexed(count, work)?.await_all();
    Ok(())
}
