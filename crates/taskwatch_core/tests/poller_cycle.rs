use pretty_assertions::assert_eq;
use taskwatch_core::{
    poll_update, reduce, Action, PollEffect, PollMsg, PollPhase, PollerState, TaskRef,
    TaskRegistry, TaskSnapshot, TaskStatus, POLL_INTERVAL,
};

fn task(id: u64, status: TaskStatus) -> TaskSnapshot {
    TaskSnapshot::new(id, "install", status)
}

fn init_logging() {
    taskwatch_logging::initialize_for_tests();
}

/// Minimal driver: runs deferred and immediate dispatches through the
/// reducer, the way the engine loop does, and returns the other effects.
fn step(
    state: PollerState,
    registry: &mut TaskRegistry,
    msg: PollMsg,
) -> (PollerState, Vec<PollEffect>) {
    let (state, effects) = poll_update(state, msg, registry);
    let mut rest = Vec::new();
    for effect in effects {
        match effect {
            PollEffect::DeferDispatch(action) | PollEffect::Dispatch(action) => {
                *registry = reduce(std::mem::take(registry), action);
            }
            other => rest.push(other),
        }
    }
    (state, rest)
}

fn schedules(effects: &[PollEffect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, PollEffect::ScheduleTimer { .. }))
        .count()
}

#[test]
fn start_defers_the_add_before_anything_else() {
    init_logging();
    let t = task(1, TaskStatus::Running);

    let (state, effects) = poll_update(PollerState::default(), PollMsg::Start(t.clone()), &TaskRegistry::new());

    assert_eq!(
        effects,
        vec![
            PollEffect::DeferDispatch(Action::Add(t)),
            PollEffect::ScheduleTimer {
                after: POLL_INTERVAL
            },
        ]
    );
    assert!(state.is_tracked(1));
    assert_eq!(state.phase(), PollPhase::Scheduled);
}

#[test]
fn terminal_tasks_are_added_but_never_tracked() {
    init_logging();
    for status in [TaskStatus::Canceled, TaskStatus::Error, TaskStatus::Done] {
        let t = task(4, status);
        let (state, effects) =
            poll_update(PollerState::default(), PollMsg::Start(t.clone()), &TaskRegistry::new());

        assert_eq!(effects, vec![PollEffect::DeferDispatch(Action::Add(t))]);
        assert!(!state.is_tracked(4));
        assert!(!state.is_active());
    }
}

#[test]
fn many_starts_schedule_a_single_timer() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let mut state = PollerState::default();
    let mut scheduled = 0;

    for id in 1..=5 {
        let (next, effects) = step(state, &mut registry, PollMsg::Start(task(id, TaskStatus::Running)));
        scheduled += schedules(&effects);
        state = next;
    }
    // Same id again: still one entry, still one timer.
    let (state, effects) = step(state, &mut registry, PollMsg::Start(task(3, TaskStatus::Running)));
    scheduled += schedules(&effects);

    assert_eq!(scheduled, 1);
    assert_eq!(state.tracked_ids().len(), 5);

    let (state, effects) = step(state, &mut registry, PollMsg::TimerFired);
    assert_eq!(
        effects,
        vec![PollEffect::Fetch {
            epoch: 0,
            tasks: (1..=5).map(|id| TaskRef::new(id, "install")).collect(),
        }]
    );
    assert_eq!(state.phase(), PollPhase::Fetching);
    assert_eq!(state.cycles(), 1);
}

#[test]
fn single_task_runs_to_completion() {
    init_logging();
    let mut registry = TaskRegistry::new();

    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    assert!(registry.contains(1));

    let (state, effects) = step(state, &mut registry, PollMsg::TimerFired);
    assert!(matches!(effects.as_slice(), [PollEffect::Fetch { .. }]));

    let mut done = task(1, TaskStatus::Done);
    done.progress = 100.0;
    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchSucceeded {
            epoch: 0,
            tasks: vec![done],
        },
    );

    assert_eq!(registry.get(1).unwrap().status, TaskStatus::Done);
    assert_eq!(registry.get(1).unwrap().progress, 100.0);
    assert_eq!(effects, vec![PollEffect::CancelTimer]);
    assert!(!state.is_active());
    assert!(state.tracked_ids().is_empty());
}

#[test]
fn finished_task_is_untracked_while_the_other_keeps_polling() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::Start(task(2, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::TimerFired);

    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchSucceeded {
            epoch: 0,
            tasks: vec![task(1, TaskStatus::Done), task(2, TaskStatus::Running)],
        },
    );

    assert!(!state.is_tracked(1));
    assert!(state.is_tracked(2));
    assert_eq!(schedules(&effects), 1);
    assert_eq!(state.phase(), PollPhase::Scheduled);

    let (_, effects) = step(state, &mut registry, PollMsg::TimerFired);
    assert_eq!(
        effects,
        vec![PollEffect::Fetch {
            epoch: 0,
            tasks: vec![TaskRef::new(2, "install")],
        }]
    );
}

#[test]
fn tick_with_nothing_left_in_registry_stops() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(7, TaskStatus::Running)));
    // The user dismissed the task before the first tick.
    registry = reduce(registry, Action::Remove(7));

    let (state, effects) = step(state, &mut registry, PollMsg::TimerFired);

    assert_eq!(effects, vec![PollEffect::CancelTimer]);
    assert!(!state.is_active());
    assert_eq!(state.cycles(), 0);
}

#[test]
fn fetch_failure_stops_the_loop() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::TimerFired);

    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchFailed {
            epoch: 0,
            reason: "connection reset".to_string(),
        },
    );

    assert_eq!(effects, vec![PollEffect::CancelTimer]);
    assert!(!state.is_active());
    // The id is abandoned in memory, but nothing schedules another fetch.
    assert!(state.is_tracked(1));
    let (_, effects) = step(state, &mut registry, PollMsg::TimerFired);
    assert!(effects.is_empty());
}

#[test]
fn stop_is_idempotent() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));

    let (state, effects) = step(state, &mut registry, PollMsg::Stop);
    assert_eq!(effects, vec![PollEffect::CancelTimer]);
    assert_eq!(state.epoch(), 1);

    let (state, effects) = step(state, &mut registry, PollMsg::Stop);
    assert!(effects.is_empty());
    assert_eq!(state.epoch(), 1);
}

#[test]
fn stale_success_updates_store_without_resurrecting_the_loop() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::TimerFired);
    // Stopped while the epoch 0 fetch is still in flight, then restarted.
    let (state, _) = step(state, &mut registry, PollMsg::Stop);
    let (state, effects) = step(state, &mut registry, PollMsg::Start(task(2, TaskStatus::Running)));
    assert_eq!(schedules(&effects), 1);

    let mut progressed = task(1, TaskStatus::Running);
    progressed.progress = 50.0;
    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchSucceeded {
            epoch: 0,
            tasks: vec![progressed],
        },
    );

    assert!(effects.is_empty());
    assert_eq!(registry.get(1).unwrap().progress, 50.0);
    assert_eq!(state.phase(), PollPhase::Scheduled);
    assert_eq!(state.epoch(), 1);
}

#[test]
fn stale_failure_does_not_stop_a_newer_loop() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::TimerFired);
    let (state, _) = step(state, &mut registry, PollMsg::Stop);
    let (state, _) = step(state, &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));

    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchFailed {
            epoch: 0,
            reason: "timeout".to_string(),
        },
    );

    assert!(effects.is_empty());
    assert!(state.is_active());
}

#[test]
fn start_during_fetch_joins_the_next_tick() {
    init_logging();
    let mut registry = TaskRegistry::new();
    let (state, _) = step(PollerState::default(), &mut registry, PollMsg::Start(task(1, TaskStatus::Running)));
    let (state, _) = step(state, &mut registry, PollMsg::TimerFired);

    let (state, effects) = step(state, &mut registry, PollMsg::Start(task(2, TaskStatus::Running)));
    assert_eq!(schedules(&effects), 0);
    assert_eq!(state.phase(), PollPhase::Fetching);

    let (state, effects) = step(
        state,
        &mut registry,
        PollMsg::FetchSucceeded {
            epoch: 0,
            tasks: vec![task(1, TaskStatus::Done)],
        },
    );
    assert_eq!(schedules(&effects), 1);

    let (_, effects) = step(state, &mut registry, PollMsg::TimerFired);
    assert_eq!(
        effects,
        vec![PollEffect::Fetch {
            epoch: 0,
            tasks: vec![TaskRef::new(2, "install")],
        }]
    );
}
