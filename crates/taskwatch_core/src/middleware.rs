use std::collections::BTreeSet;

use crate::{Action, TaskSnapshot};

/// Decides which dispatched actions start polling.
///
/// `Poll` always does. `TaskStarted` does when its kind was registered as
/// task-producing. Registry actions never do, so the poller's own `Add` and
/// `Update` dispatches cannot loop back into it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskMiddleware {
    task_actions: BTreeSet<String>,
}

impl TaskMiddleware {
    pub fn new<I, S>(task_actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task_actions: task_actions.into_iter().map(Into::into).collect(),
        }
    }

    /// The task to hand to `start_polling`, if `action` calls for it.
    pub fn task_to_poll<'a>(&self, action: &'a Action) -> Option<&'a TaskSnapshot> {
        match action {
            Action::Poll(task) => Some(task),
            Action::TaskStarted { kind, task } if self.task_actions.contains(kind) => Some(task),
            Action::TaskStarted { .. } | Action::Add(_) | Action::Update(_) | Action::Remove(_) => {
                None
            }
        }
    }
}
