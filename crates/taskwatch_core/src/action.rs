use crate::task::{TaskId, TaskSnapshot};

pub const ADD: &str = "backgroundTask/ADD";
pub const UPDATE: &str = "backgroundTask/UPDATE";
pub const POLL: &str = "backgroundTask/POLL";
pub const REMOVE: &str = "backgroundTask/REMOVE";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Store a task the registry has not seen yet.
    Add(TaskSnapshot),
    /// Replace a known task with a fresher snapshot.
    Update(TaskSnapshot),
    /// Drop a task, e.g. when the user dismisses it.
    Remove(TaskId),
    /// Start (or resume) polling a task.
    Poll(TaskSnapshot),
    /// Application-level action that carries a freshly started task, such as
    /// "install started". Whether it triggers polling depends on `kind`
    /// being registered with the middleware.
    TaskStarted { kind: String, task: TaskSnapshot },
}

impl Action {
    pub fn kind(&self) -> &str {
        match self {
            Action::Add(_) => ADD,
            Action::Update(_) => UPDATE,
            Action::Remove(_) => REMOVE,
            Action::Poll(_) => POLL,
            Action::TaskStarted { kind, .. } => kind,
        }
    }

    /// The task payload, for every action that carries one.
    pub fn task(&self) -> Option<&TaskSnapshot> {
        match self {
            Action::Add(task)
            | Action::Update(task)
            | Action::Poll(task)
            | Action::TaskStarted { task, .. } => Some(task),
            Action::Remove(_) => None,
        }
    }
}
