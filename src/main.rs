/*!
 * coord-demo - Coordination Patterns Walkthrough
 *
 * Runs every primitive end to end:
 * - Closure hand-off through a completion barrier
 * - Indexed fan-out
 * - Periodic ping with cooperative stop
 * - Contended counter
 * - Conserved-sum invariant under opposing transfers
 * - Quorum vote with early exit
 */

use std::error::Error;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

use coordkit::core::limits::{
    COUNTER_DEMO_WORKERS, DISPATCH_DEMO_WORKERS, INVARIANT_INITIAL_BALANCE,
    INVARIANT_SAMPLE_WINDOW, INVARIANT_WORKERS_PER_DIRECTION, PERIODIC_DEMO_RUNTIME,
    QUORUM_DEMO_THRESHOLD, QUORUM_DEMO_VOTERS,
};
use coordkit::{
    dispatch_indexed, init_tracing, run_indexed, ConservedPair, Direction, GuardedCounter,
    PeriodicTask, SyncConfig, VoteCoordinator, VoteOutcome,
};
use parking_lot::Mutex;
use rand::Rng;

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let config = SyncConfig::from_env()?;
    info!(
        strategy = config.select_strategy().name(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "coordination demo starting"
    );

    handoff()?;
    fan_out()?;
    periodic_ping(&config)?;
    contended_counter()?;
    conserved_sum()?;
    quorum_vote(&config)?;

    info!("coordination demo complete");
    Ok(())
}

/// A worker writes a value the coordinator reads after the barrier
fn handoff() -> Result<(), Box<dyn Error>> {
    let slot = Arc::new(Mutex::new(String::new()));
    let writer = slot.clone();
    run_indexed(1, move |_| *writer.lock() = "Hello World".to_string())?;
    info!(value = %slot.lock(), "value handed off");
    Ok(())
}

/// Each worker receives its own index at dispatch time
fn fan_out() -> Result<(), Box<dyn Error>> {
    let barrier = dispatch_indexed(DISPATCH_DEMO_WORKERS, send_rpc)?;
    barrier.await_all();
    Ok(())
}

fn send_rpc(rpc_no: usize) {
    info!(rpc_no, "sending RPC call");
}

fn periodic_ping(config: &SyncConfig) -> Result<(), Box<dyn Error>> {
    let task = PeriodicTask::start_named("ping", |_| info!("ping"), config.poll_interval)?;
    thread::sleep(PERIODIC_DEMO_RUNTIME);

    task.request_stop();
    info!("cancelled");
    let actions = task.join()?;
    info!(actions, "ping task finished");
    Ok(())
}

fn contended_counter() -> Result<(), Box<dyn Error>> {
    let counter = Arc::new(GuardedCounter::new());
    let workers = counter.clone();
    run_indexed(COUNTER_DEMO_WORKERS, move |_| {
        workers.increment();
    })?;

    let total = counter.read();
    info!(total, expected = COUNTER_DEMO_WORKERS, "counter settled");
    if total != COUNTER_DEMO_WORKERS as u64 {
        error!(total, "lost updates detected");
    }
    Ok(())
}

fn conserved_sum() -> Result<(), Box<dyn Error>> {
    let pair = Arc::new(ConservedPair::new(
        INVARIANT_INITIAL_BALANCE,
        INVARIANT_INITIAL_BALANCE,
    ));

    let a_to_b = {
        let pair = pair.clone();
        dispatch_indexed(INVARIANT_WORKERS_PER_DIRECTION, move |_| {
            pair.transfer(Direction::AToB);
        })?
    };
    let b_to_a = {
        let pair = pair.clone();
        dispatch_indexed(INVARIANT_WORKERS_PER_DIRECTION, move |_| {
            pair.transfer(Direction::BToA);
        })?
    };

    let report = pair.watch(INVARIANT_SAMPLE_WINDOW);
    a_to_b.await_all();
    b_to_a.await_all();

    if report.is_clean() {
        info!(samples = report.samples, "invariant held for every sample");
    } else {
        error!(violations = report.violations, "found deviation in the invariant");
    }
    Ok(())
}

fn quorum_vote(config: &SyncConfig) -> Result<(), Box<dyn Error>> {
    let coordinator = VoteCoordinator::new(config.clone());
    let report = coordinator.run_detailed(QUORUM_DEMO_VOTERS, QUORUM_DEMO_THRESHOLD, |_| {
        rand::thread_rng().gen_bool(0.5)
    });
    let report_json = serde_json::to_string(&report)?;
    debug!(report = %report_json, "quorum report");

    match report.outcome {
        VoteOutcome::Won => info!(
            positive = report.tally.positive_votes,
            "received {}+ votes, you won",
            QUORUM_DEMO_THRESHOLD
        ),
        VoteOutcome::Lost => info!(
            positive = report.tally.positive_votes,
            "unfortunately, you lost"
        ),
    }
    Ok(())
}
