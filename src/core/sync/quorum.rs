/*!
 * Quorum Vote Coordinator
 *
 * Dispatches one thread per voter, tallies boolean votes under a single
 * lock, and returns as soon as the outcome is decided:
 *
 * - **Won**: positive votes reached the threshold (may be before every voter
 *   has finished; stragglers keep running but no longer matter)
 * - **Lost**: every voter finished without reaching the threshold
 *
 * # Wait Strategies
 *
 * - `SpinWait`: lock, test, unlock, back off, repeat. Backoff escalates to
 *   capped sleeps so a long wait does not pin a core.
 * - `Condvar`: park until a voter records a vote, then re-test.
 *
 * With `max_wait` set, a wait that outlives the bound resolves as `Lost`.
 *
 * # Edge Cases
 *
 * - Zero voters resolve as `Lost` without dispatching anything.
 * - A threshold above the voter count can only end through exhaustion.
 * - A voter that panics counts as a completed, non-positive vote.
 */

use super::config::{StrategyType, SyncConfig};
use super::spinwait::Backoff;
use crate::monitoring::span_operation;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Terminal result of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Won,
    Lost,
}

/// Running tally of a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub positive_votes: usize,
    pub completed_votes: usize,
    pub quorum_threshold: usize,
    pub total_voters: usize,
}

impl VoteTally {
    pub fn new(total_voters: usize, quorum_threshold: usize) -> Self {
        Self {
            positive_votes: 0,
            completed_votes: 0,
            quorum_threshold,
            total_voters,
        }
    }

    #[inline]
    pub fn quorum_reached(&self) -> bool {
        self.total_voters > 0 && self.positive_votes >= self.quorum_threshold
    }

    #[inline]
    pub fn exhausted(&self) -> bool {
        self.completed_votes == self.total_voters
    }

    /// Whether no further vote can change the outcome
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.quorum_reached() || self.exhausted()
    }

    /// Outcome as of this tally
    pub fn outcome(&self) -> VoteOutcome {
        if self.quorum_reached() {
            VoteOutcome::Won
        } else {
            VoteOutcome::Lost
        }
    }

    fn record(&mut self, positive: bool) {
        debug_assert!(self.completed_votes < self.total_voters, "voter recorded twice");
        self.completed_votes += 1;
        if positive {
            self.positive_votes += 1;
        }
    }
}

/// Detailed result of a coordinator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumReport {
    pub outcome: VoteOutcome,
    /// Tally at the moment the decision was taken
    pub tally: VoteTally,
    pub elapsed: Duration,
    pub strategy: StrategyType,
    /// The wait gave up at `max_wait` before a terminal tally
    pub timed_out: bool,
}

/// Tally plus the condvar voters signal after each record
#[derive(Debug)]
struct Ballot {
    tally: Mutex<VoteTally>,
    changed: Condvar,
}

impl Ballot {
    fn record(&self, positive: bool) {
        self.tally.lock().record(positive);
        self.changed.notify_all();
    }

    fn snapshot(&self) -> VoteTally {
        *self.tally.lock()
    }
}

/// Records the voter's result exactly once; a voter that unwinds before
/// recording is counted as a non-positive vote
struct VoteRecorder {
    ballot: Arc<Ballot>,
    voter: usize,
    recorded: bool,
}

impl VoteRecorder {
    fn record(mut self, positive: bool) {
        self.recorded = true;
        self.ballot.record(positive);
    }
}

impl Drop for VoteRecorder {
    fn drop(&mut self) {
        if !self.recorded {
            error!(voter = self.voter, "voter exited without a vote; counted as negative");
            self.ballot.record(false);
        }
    }
}

/// Runs quorum votes with a configured wait strategy
#[derive(Debug, Clone, Default)]
pub struct VoteCoordinator {
    config: SyncConfig,
}

impl VoteCoordinator {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run a vote and return only its outcome
    pub fn run<F>(&self, total_voters: usize, quorum_threshold: usize, vote_fn: F) -> VoteOutcome
    where
        F: Fn(usize) -> bool + Send + Sync + 'static,
    {
        self.run_detailed(total_voters, quorum_threshold, vote_fn)
            .outcome
    }

    /// Run a vote: `vote_fn(i)` is called once for every voter index `i`
    pub fn run_detailed<F>(
        &self,
        total_voters: usize,
        quorum_threshold: usize,
        vote_fn: F,
    ) -> QuorumReport
    where
        F: Fn(usize) -> bool + Send + Sync + 'static,
    {
        let span = span_operation("quorum_vote");
        let start = Instant::now();
        let strategy = self.config.select_strategy();

        let ballot = Arc::new(Ballot {
            tally: Mutex::new(VoteTally::new(total_voters, quorum_threshold)),
            changed: Condvar::new(),
        });

        if quorum_threshold > total_voters {
            debug!(
                total_voters,
                quorum_threshold, "threshold exceeds voter count; vote can only be lost"
            );
        }

        let vote_fn = Arc::new(vote_fn);
        for voter in 0..total_voters {
            spawn_voter(voter, ballot.clone(), vote_fn.clone());
        }

        let deadline = self.config.max_wait.map(|bound| start + bound);
        let (tally, timed_out) = match strategy {
            StrategyType::SpinWait => spin_until_terminal(&ballot, &self.config, deadline),
            StrategyType::Condvar | StrategyType::Auto => block_until_terminal(&ballot, deadline),
        };

        if timed_out {
            warn!(
                positive = tally.positive_votes,
                completed = tally.completed_votes,
                total = total_voters,
                max_wait = ?self.config.max_wait,
                "quorum wait bound exceeded; treating vote as lost"
            );
        }

        let outcome = if timed_out {
            VoteOutcome::Lost
        } else {
            tally.outcome()
        };
        span.record_outcome(outcome);
        info!(
            ?outcome,
            positive = tally.positive_votes,
            completed = tally.completed_votes,
            threshold = quorum_threshold,
            total = total_voters,
            strategy = strategy.name(),
            "quorum decided"
        );

        QuorumReport {
            outcome,
            tally,
            elapsed: start.elapsed(),
            strategy,
            timed_out,
        }
    }
}

fn spawn_voter<F>(voter: usize, ballot: Arc<Ballot>, vote_fn: Arc<F>)
where
    F: Fn(usize) -> bool + Send + Sync + 'static,
{
    let recorder = VoteRecorder {
        ballot,
        voter,
        recorded: false,
    };

    let spawned = thread::Builder::new()
        .name(format!("voter-{}", voter))
        .spawn(move || {
            let vote = (*vote_fn)(voter);
            recorder.record(vote);
        });

    // The closure (and its recorder) is dropped on failure, recording a
    // negative vote so the tally still reaches exhaustion.
    if let Err(e) = spawned {
        error!(voter, error = %e, "failed to spawn voter thread");
    }
}

/// Lock, test, unlock, back off
fn spin_until_terminal(
    ballot: &Ballot,
    config: &SyncConfig,
    deadline: Option<Instant>,
) -> (VoteTally, bool) {
    let mut backoff = Backoff::from_config(config);
    loop {
        let tally = ballot.snapshot();
        if tally.is_terminal() {
            return (tally, false);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return (tally, true);
        }
        backoff.snooze();
    }
}

/// Park on the condvar between votes
fn block_until_terminal(ballot: &Ballot, deadline: Option<Instant>) -> (VoteTally, bool) {
    let mut tally = ballot.tally.lock();
    while !tally.is_terminal() {
        match deadline {
            Some(deadline) => {
                if ballot.changed.wait_until(&mut tally, deadline).timed_out()
                    && !tally.is_terminal()
                {
                    return (*tally, true);
                }
            }
            None => ballot.changed.wait(&mut tally),
        }
    }
    (*tally, false)
}
