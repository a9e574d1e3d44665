//! Taskwatch engine: runs the poller against a task source and owns the registry.
mod commands;
mod engine;
mod settings;
mod source;
mod types;

pub use engine::EngineHandle;
pub use settings::{EngineSettings, SettingsError, SourceSettings};
pub use source::{HttpTaskSource, TaskSource};
pub use types::{
    EngineError, Envelope, FailureKind, FetchError, PollerStatus, ResponseStatus, TaskData,
    TasksData,
};
