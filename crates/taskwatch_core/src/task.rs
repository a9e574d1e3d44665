use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    Started,
    Running,
    Canceled,
    Error,
    Done,
}

impl TaskStatus {
    /// `Canceled`, `Error` and `Done` admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Canceled | TaskStatus::Error | TaskStatus::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::Started => "started",
            TaskStatus::Running => "running",
            TaskStatus::Canceled => "canceled",
            TaskStatus::Error => "error",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-steps report in the same status domain as their task.
pub type StepStatus = TaskStatus;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskStep {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Steps arrive either as a plain list or as an object keyed by step code.
/// Keyed steps keep the order the backend sent them in.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSteps {
    List(Vec<TaskStep>),
    Keyed(Vec<(String, TaskStep)>),
}

impl Default for TaskSteps {
    fn default() -> Self {
        TaskSteps::List(Vec::new())
    }
}

/// A step paired with the name the progress drawer shows for it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedStep<'a> {
    pub name: String,
    pub step: &'a TaskStep,
}

impl TaskSteps {
    pub fn len(&self) -> usize {
        match self {
            TaskSteps::List(steps) => steps.len(),
            TaskSteps::Keyed(steps) => steps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steps in display order, named by their key, or by their index for
    /// listed steps.
    pub fn named(&self) -> Vec<NamedStep<'_>> {
        match self {
            TaskSteps::List(steps) => steps
                .iter()
                .enumerate()
                .map(|(index, step)| NamedStep {
                    name: index.to_string(),
                    step,
                })
                .collect(),
            TaskSteps::Keyed(steps) => steps
                .iter()
                .map(|(name, step)| NamedStep {
                    name: name.clone(),
                    step,
                })
                .collect(),
        }
    }
}

impl Serialize for TaskSteps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaskSteps::List(steps) => steps.serialize(serializer),
            TaskSteps::Keyed(steps) => {
                let mut map = serializer.serialize_map(Some(steps.len()))?;
                for (name, step) in steps {
                    map.serialize_entry(name, step)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for TaskSteps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(StepsVisitor)
    }
}

struct StepsVisitor;

impl<'de> Visitor<'de> for StepsVisitor {
    type Value = TaskSteps;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list or a map of task steps")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(TaskSteps::default())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
        Ok(TaskSteps::default())
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut steps = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(step) = seq.next_element()? {
            steps.push(step);
        }
        Ok(TaskSteps::List(steps))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut steps = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((name, step)) = map.next_entry::<String, TaskStep>()? {
            steps.push((name, step));
        }
        Ok(TaskSteps::Keyed(steps))
    }
}

/// Client-visible status record of one server-side background job.
///
/// Equality is structural over every field, nested steps included; the
/// reducer relies on it to drop poll results that repeat stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub steps: TaskSteps,
    #[serde(default)]
    pub public_params: serde_json::Value,
}

impl TaskSnapshot {
    pub fn new(id: TaskId, code: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id,
            code: code.into(),
            title: String::new(),
            status,
            progress: 0.0,
            errors: Vec::new(),
            steps: TaskSteps::default(),
            public_params: serde_json::Value::Null,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Error
    }

    /// Done, but the backend reported non-fatal errors along the way.
    pub fn has_warnings(&self) -> bool {
        self.is_done() && !self.errors.is_empty()
    }

    pub fn intent(&self) -> Intent {
        if self.is_failed() {
            Intent::Danger
        } else {
            Intent::Warning
        }
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id,
            code: self.code.clone(),
        }
    }
}

/// Severity used when presenting a task's error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Danger,
    Warning,
}

/// The `{id, code}` pair the backend needs to look a task up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: TaskId,
    pub code: String,
}

impl TaskRef {
    pub fn new(id: TaskId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.code)
    }
}
