#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use taskwatch_core::{TaskRef, TaskSnapshot, TaskStatus};
use taskwatch_engine::{
    EngineHandle, FailureKind, FetchError, PollerStatus, TaskSource,
};
use tokio::time::Instant;

pub const WAIT: Duration = Duration::from_secs(60);

pub fn task(id: u64, status: TaskStatus) -> TaskSnapshot {
    TaskSnapshot::new(id, "install", status)
}

pub fn with_progress(mut task: TaskSnapshot, progress: f64) -> TaskSnapshot {
    task.progress = progress;
    task
}

pub fn network_error() -> FetchError {
    FetchError::new(FailureKind::Network, "connection reset")
}

/// In-memory task source answering batch fetches from a script, one entry
/// per call. Single-task fetches and removals answer from fixed slots.
#[derive(Default)]
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Result<Vec<TaskSnapshot>, FetchError>>>,
    fetch_delay: Duration,
    single: Mutex<Option<Result<TaskSnapshot, FetchError>>>,
    remove_result: Mutex<Option<FetchError>>,
    calls: Mutex<Vec<(Instant, Vec<TaskRef>)>>,
    removed: Mutex<Vec<Vec<TaskRef>>>,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Result<Vec<TaskSnapshot>, FetchError>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Self::default()
        }
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = delay;
        self
    }

    pub fn with_single(self, answer: Result<TaskSnapshot, FetchError>) -> Self {
        *self.single.lock().unwrap() = Some(answer);
        self
    }

    pub fn failing_removals(self, err: FetchError) -> Self {
        *self.remove_result.lock().unwrap() = Some(err);
        self
    }

    pub fn calls(&self) -> Vec<(Instant, Vec<TaskRef>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<Vec<TaskRef>> {
        self.removed.lock().unwrap().clone()
    }

    fn removal(&self, tasks: Vec<TaskRef>) -> Result<(), FetchError> {
        self.removed.lock().unwrap().push(tasks);
        match self.remove_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl TaskSource for ScriptedSource {
    async fn fetch_tasks(&self, tasks: &[TaskRef]) -> Result<Vec<TaskSnapshot>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((Instant::now(), tasks.to_vec()));
        let answer = self
            .batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::new(FailureKind::Network, "script exhausted")));
        if !self.fetch_delay.is_zero() {
            tokio::time::sleep(self.fetch_delay).await;
        }
        answer
    }

    async fn fetch_task(&self, task: &TaskRef) -> Result<TaskSnapshot, FetchError> {
        self.single
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(FetchError::new(FailureKind::ErrorStatus, format!("no task {task}"))))
    }

    async fn remove_task(&self, task: &TaskRef) -> Result<(), FetchError> {
        self.removal(vec![task.clone()])
    }

    async fn remove_tasks(&self, tasks: &[TaskRef]) -> Result<(), FetchError> {
        self.removal(tasks.to_vec())
    }
}

pub async fn wait_for_status<F>(engine: &EngineHandle, mut done: F) -> PollerStatus
where
    F: FnMut(&PollerStatus) -> bool,
{
    let mut rx = engine.subscribe_status();
    let status = tokio::time::timeout(WAIT, rx.wait_for(|status| done(status)))
        .await
        .expect("timed out waiting for poller status")
        .expect("engine stopped")
        .clone();
    status
}

pub async fn wait_for_task<F>(engine: &EngineHandle, id: u64, mut done: F) -> TaskSnapshot
where
    F: FnMut(&TaskSnapshot) -> bool,
{
    let mut rx = engine.subscribe();
    let registry = tokio::time::timeout(
        WAIT,
        rx.wait_for(|registry| registry.get(id).is_some_and(|task| done(task))),
    )
    .await
    .expect("timed out waiting for task")
    .expect("engine stopped")
    .clone();
    registry.get(id).cloned().expect("task present")
}

/// Lets the engine drain everything queued so far. Time is paused in these
/// tests, so this only moves the clock by a millisecond.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
