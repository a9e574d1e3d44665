use std::fmt;

use serde::{Deserialize, Serialize};
use taskwatch_core::{TaskId, TaskRef, TaskSnapshot};

use crate::settings::SettingsError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    /// The body was not a task envelope.
    Decode,
    /// The backend answered with an envelope whose status is not `ok`.
    ErrorStatus,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Decode => write!(f, "undecodable response"),
            FailureKind::ErrorStatus => write!(f, "backend reported an error"),
        }
    }
}

/// Failure to start the shared engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to start the engine runtime: {0}")]
    Runtime(std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
    #[serde(other)]
    Unknown,
}

/// `{status, data}` wrapper every backend endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Checks the status only, for endpoints whose payload is irrelevant.
    pub fn ensure_ok(&self) -> Result<(), FetchError> {
        match self.status {
            ResponseStatus::Ok => Ok(()),
            status => Err(FetchError::new(
                FailureKind::ErrorStatus,
                format!("envelope status {status:?}"),
            )),
        }
    }

    /// The payload of an ok envelope; anything else is an error.
    pub fn into_data(self) -> Result<T, FetchError> {
        match (self.status, self.data) {
            (ResponseStatus::Ok, Some(data)) => Ok(data),
            (ResponseStatus::Ok, None) => Err(FetchError::new(
                FailureKind::Decode,
                "ok envelope without data",
            )),
            (status, _) => Err(FetchError::new(
                FailureKind::ErrorStatus,
                format!("envelope status {status:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksData {
    pub tasks: Vec<TaskSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskData {
    pub task: TaskSnapshot,
}

/// Request body for the batch endpoints.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct TaskRefs<'a> {
    pub tasks: &'a [TaskRef],
}

/// What the poller is doing, published by the engine after every step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollerStatus {
    pub tracked: Vec<TaskId>,
    pub active: bool,
    pub cycles: u64,
}
