//! Taskwatch core: task model, registry reducer and the pure poller state machine.
mod action;
mod middleware;
mod poller;
mod reducer;
mod registry;
mod task;
mod view_model;

pub use action::{Action, ADD, POLL, REMOVE, UPDATE};
pub use middleware::TaskMiddleware;
pub use poller::{poll_update, PollEffect, PollMsg, PollPhase, PollerState, POLL_INTERVAL};
pub use reducer::reduce;
pub use registry::TaskRegistry;
pub use task::{
    Intent, NamedStep, StepStatus, TaskId, TaskRef, TaskSnapshot, TaskStatus, TaskStep, TaskSteps,
};
pub use view_model::{TaskListView, TaskRowView, TaskSummary};
