use std::collections::{BTreeMap, BTreeSet};

use crate::task::{TaskId, TaskRef, TaskSnapshot};
use crate::view_model::TaskListView;

/// Every task snapshot the application knows about, keyed by id.
///
/// Only the reducer mutates a registry. Each real change raises the dirty
/// flag, so whoever owns the registry can tell an actual change from a
/// no-op with [`TaskRegistry::consume_dirty`].
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskId, TaskSnapshot>,
    dirty: bool,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a registry with tasks already known at startup. A duplicate
    /// id keeps its first occurrence, as a repeated `Add` would.
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskSnapshot>) -> Self {
        let mut map = BTreeMap::new();
        for task in tasks {
            map.entry(task.id).or_insert(task);
        }
        Self {
            tasks: map,
            dirty: false,
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskSnapshot> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ascending id order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TaskSnapshot> {
        self.tasks.values()
    }

    /// Display order: newest id first.
    pub fn newest_first(&self) -> impl Iterator<Item = &TaskSnapshot> {
        self.tasks.values().rev()
    }

    /// Tasks that have not reached a terminal status yet.
    pub fn active_tasks(&self) -> Vec<TaskSnapshot> {
        self.iter()
            .filter(|task| !task.is_completed())
            .cloned()
            .collect()
    }

    pub fn completed_tasks(&self) -> Vec<&TaskSnapshot> {
        self.iter().filter(|task| task.is_completed()).collect()
    }

    /// Lookup pairs for every stored task whose id is in `ids`.
    pub fn refs_for(&self, ids: &BTreeSet<TaskId>) -> Vec<TaskRef> {
        ids.iter()
            .filter_map(|id| self.tasks.get(id))
            .map(TaskSnapshot::task_ref)
            .collect()
    }

    pub fn view(&self) -> TaskListView {
        TaskListView::from_tasks(self.newest_first())
    }

    /// Returns whether the registry changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn insert(&mut self, task: TaskSnapshot) {
        self.tasks.insert(task.id, task);
        self.dirty = true;
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<TaskSnapshot> {
        let removed = self.tasks.remove(&id);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }
}

/// Registries compare by content; the dirty flag is bookkeeping, not state.
impl PartialEq for TaskRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.tasks == other.tasks
    }
}
