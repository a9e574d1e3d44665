use crate::{Intent, TaskId, TaskSnapshot, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSummary {
    pub running: usize,
    pub done: usize,
    pub warning: usize,
    pub failed: usize,
}

impl TaskSummary {
    /// More than one category present, or one category with several tasks.
    /// The panel offers "hide completed" exactly in this case.
    pub fn several_statuses(&self) -> bool {
        let mut seen_one = false;
        for count in [self.running, self.done, self.warning, self.failed] {
            if count == 0 {
                continue;
            }
            if seen_one || count > 1 {
                return true;
            }
            seen_one = true;
        }
        false
    }

    pub fn total(&self) -> usize {
        self.running + self.done + self.warning + self.failed
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskListView {
    pub summary: TaskSummary,
    pub rows: Vec<TaskRowView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRowView {
    pub id: TaskId,
    pub code: String,
    pub title: String,
    pub status: TaskStatus,
    pub progress: f64,
    pub intent: Intent,
    pub errors: Vec<String>,
}

impl TaskListView {
    /// Rows keep the order of `tasks`; the registry passes them newest first.
    pub(crate) fn from_tasks<'a>(tasks: impl Iterator<Item = &'a TaskSnapshot>) -> Self {
        let mut view = TaskListView::default();
        for task in tasks {
            // Canceled tasks are completed but belong to no summary bucket.
            if !task.is_completed() {
                view.summary.running += 1;
            } else if task.has_warnings() {
                view.summary.warning += 1;
            } else if task.is_done() {
                view.summary.done += 1;
            } else if task.is_failed() {
                view.summary.failed += 1;
            }
            view.rows.push(TaskRowView {
                id: task.id,
                code: task.code.clone(),
                title: task.title.clone(),
                status: task.status,
                progress: task.progress,
                intent: task.intent(),
                errors: task.errors.clone(),
            });
        }
        view
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
