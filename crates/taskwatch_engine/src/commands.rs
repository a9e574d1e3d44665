//! Task commands: request/response calls against the source that keep the
//! registry in step with what they learn or change.
use taskwatch_core::{Action, TaskId, TaskRef, TaskSnapshot};
use taskwatch_logging::{watch_info, watch_warn};

use crate::engine::EngineHandle;
use crate::FetchError;

impl EngineHandle {
    /// Fetches one task. A task the registry does not know yet is handed to
    /// the store as a poll request, which adds it and polls it if running.
    /// Failures are logged and yield `None`.
    pub async fn fetch_task(&self, task: &TaskRef) -> Option<TaskSnapshot> {
        match self.source.fetch_task(task).await {
            Ok(snapshot) => {
                if !self.tasks().contains(snapshot.id) {
                    self.dispatch(Action::Poll(snapshot.clone()));
                }
                Some(snapshot)
            }
            Err(err) => {
                watch_warn!("fetching task {} failed: {}", task, err);
                None
            }
        }
    }

    /// Batch form of [`EngineHandle::fetch_task`]. Failures yield an empty list.
    pub async fn fetch_tasks(&self, tasks: &[TaskRef]) -> Vec<TaskSnapshot> {
        match self.source.fetch_tasks(tasks).await {
            Ok(snapshots) => {
                let known = self.tasks();
                for snapshot in snapshots.iter().filter(|s| !known.contains(s.id)) {
                    self.dispatch(Action::Poll(snapshot.clone()));
                }
                snapshots
            }
            Err(err) => {
                watch_warn!("fetching {} task(s) failed: {}", tasks.len(), err);
                Vec::new()
            }
        }
    }

    /// Drops the task from the registry, then asks the backend to forget it.
    /// The local removal stands even when the backend call fails.
    pub async fn remove_task(&self, task: &TaskRef) -> Result<(), FetchError> {
        self.dispatch(Action::Remove(task.id));
        self.source.remove_task(task).await
    }

    /// Removes every completed task, locally and then on the backend, and
    /// returns the removed ids.
    pub async fn remove_completed_tasks(&self) -> Result<Vec<TaskId>, FetchError> {
        let registry = self.tasks();
        let refs: Vec<TaskRef> = registry
            .completed_tasks()
            .into_iter()
            .map(TaskSnapshot::task_ref)
            .collect();
        if refs.is_empty() {
            return Ok(Vec::new());
        }

        for task in &refs {
            self.dispatch(Action::Remove(task.id));
        }
        watch_info!("removing {} completed task(s)", refs.len());
        self.source.remove_tasks(&refs).await?;
        Ok(refs.into_iter().map(|task| task.id).collect())
    }

    /// Asks the store to poll every task that is still running; completed
    /// ones are left alone.
    pub fn poll_tasks<I>(&self, tasks: I)
    where
        I: IntoIterator<Item = TaskSnapshot>,
    {
        for task in tasks.into_iter().filter(|task| !task.is_completed()) {
            self.dispatch(Action::Poll(task));
        }
    }
}
