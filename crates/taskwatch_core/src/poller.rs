use std::collections::BTreeSet;
use std::time::Duration;

use crate::{Action, TaskId, TaskRef, TaskRegistry, TaskSnapshot};

/// Delay between the end of one poll cycle and the next fetch.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollPhase {
    /// No tick scheduled, no current fetch.
    #[default]
    Idle,
    /// Exactly one tick is scheduled.
    Scheduled,
    /// The fetch of the current epoch is in flight.
    Fetching,
}

/// Poller bookkeeping: which ids are watched and where the single polling
/// cycle currently is.
///
/// There is one phase field rather than separate timer and fetch flags, so
/// "at most one tick scheduled or one fetch in flight" holds by
/// construction. `epoch` is bumped on every stop; a fetch result carrying an
/// older epoch belongs to a loop that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerState {
    tracked: BTreeSet<TaskId>,
    phase: PollPhase,
    epoch: u64,
    cycles: u64,
    interval: Duration,
}

impl Default for PollerState {
    fn default() -> Self {
        Self::new(POLL_INTERVAL)
    }
}

impl PollerState {
    pub fn new(interval: Duration) -> Self {
        Self {
            tracked: BTreeSet::new(),
            phase: PollPhase::Idle,
            epoch: 0,
            cycles: 0,
            interval,
        }
    }

    pub fn tracked_ids(&self) -> &BTreeSet<TaskId> {
        &self.tracked
    }

    pub fn is_tracked(&self, id: TaskId) -> bool {
        self.tracked.contains(&id)
    }

    /// True while a tick is scheduled or a fetch is in flight.
    pub fn is_active(&self) -> bool {
        self.phase != PollPhase::Idle
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of fetches issued so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn schedule(&mut self, effects: &mut Vec<PollEffect>) {
        self.phase = PollPhase::Scheduled;
        effects.push(PollEffect::ScheduleTimer {
            after: self.interval,
        });
    }

    fn stop(&mut self, effects: &mut Vec<PollEffect>) {
        if self.phase == PollPhase::Idle {
            return;
        }
        self.phase = PollPhase::Idle;
        self.epoch += 1;
        effects.push(PollEffect::CancelTimer);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.phase == PollPhase::Fetching && self.epoch == epoch
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollMsg {
    /// `startPolling(task)`.
    Start(TaskSnapshot),
    /// `stopPolling()`.
    Stop,
    /// The scheduled tick elapsed.
    TimerFired,
    /// The fetch collaborator answered with an ok envelope.
    FetchSucceeded { epoch: u64, tasks: Vec<TaskSnapshot> },
    /// Transport failure or error envelope; both end the loop.
    FetchFailed { epoch: u64, reason: String },
}

/// Side effects requested by the poller, executed by whoever drives it.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEffect {
    /// Dispatch on the next turn of the loop, after work already queued.
    DeferDispatch(Action),
    /// Dispatch right away, within the current turn.
    Dispatch(Action),
    /// Replace the tick slot with a one-shot timer.
    ScheduleTimer { after: Duration },
    /// Empty the tick slot. A no-op when nothing is scheduled.
    CancelTimer,
    /// Ask the fetch collaborator for a fresh snapshot of `tasks`.
    Fetch { epoch: u64, tasks: Vec<TaskRef> },
}

/// Pure poller transition.
///
/// `registry` is the live store contents; it is only read on
/// [`PollMsg::TimerFired`] to work out which tracked tasks still exist.
pub fn poll_update(
    mut state: PollerState,
    msg: PollMsg,
    registry: &TaskRegistry,
) -> (PollerState, Vec<PollEffect>) {
    let mut effects = Vec::new();
    match msg {
        PollMsg::Start(task) => {
            // The add is deferred so that whatever the caller does in the
            // same turn reaches the store before the task does.
            let completed = task.is_completed();
            let id = task.id;
            effects.push(PollEffect::DeferDispatch(Action::Add(task)));
            if completed {
                return (state, effects);
            }
            state.tracked.insert(id);
            if state.phase == PollPhase::Idle {
                state.schedule(&mut effects);
            }
        }
        PollMsg::Stop => state.stop(&mut effects),
        PollMsg::TimerFired => {
            if state.phase != PollPhase::Scheduled {
                return (state, effects);
            }
            let tasks = registry.refs_for(&state.tracked);
            if tasks.is_empty() {
                // Nothing left to watch: never leave an idle timer running.
                state.stop(&mut effects);
                return (state, effects);
            }
            state.phase = PollPhase::Fetching;
            state.cycles += 1;
            effects.push(PollEffect::Fetch {
                epoch: state.epoch,
                tasks,
            });
        }
        PollMsg::FetchSucceeded { epoch, tasks } => {
            for task in tasks {
                if task.is_completed() {
                    state.tracked.remove(&task.id);
                }
                effects.push(PollEffect::Dispatch(Action::Update(task)));
            }
            // A stale answer still updates the store, but the loop it
            // belonged to is gone and must not be resurrected.
            if !state.is_current(epoch) {
                return (state, effects);
            }
            if state.tracked.is_empty() {
                state.stop(&mut effects);
            } else {
                state.schedule(&mut effects);
            }
        }
        PollMsg::FetchFailed { epoch, .. } => {
            if state.is_current(epoch) {
                state.stop(&mut effects);
            }
        }
    }
    (state, effects)
}
