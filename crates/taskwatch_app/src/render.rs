use std::fmt::Write;

use chrono::{DateTime, Local};
use taskwatch_core::{Intent, TaskListView, TaskRowView, TaskSummary};

/// Renders the task panel as plain text: a timestamped summary line, then
/// one line per task (newest first) with its errors indented below it.
/// A mixed panel ends with a hint on clearing the completed tasks.
pub fn render_view(view: &TaskListView, now: DateTime<Local>) -> String {
    let mut out = format!("[{}] {}", now.format("%H:%M:%S"), summary_line(&view.summary));
    for row in &view.rows {
        out.push('\n');
        push_row(&mut out, row);
    }
    let completed = view.summary.total() - view.summary.running;
    if view.summary.several_statuses() && completed > 0 {
        let _ = write!(out, "\n  {completed} completed, clear with --remove-completed");
    }
    out
}

fn summary_line(summary: &TaskSummary) -> String {
    if summary.total() == 0 {
        return "no tasks".to_string();
    }
    let mut parts = Vec::new();
    for (count, label) in [
        (summary.running, "running"),
        (summary.done, "done"),
        (summary.warning, "done with warnings"),
        (summary.failed, "failed"),
    ] {
        if count > 0 {
            parts.push(format!("{count} {label}"));
        }
    }
    parts.join(", ")
}

fn push_row(out: &mut String, row: &TaskRowView) {
    let title = if row.title.is_empty() {
        row.code.as_str()
    } else {
        row.title.as_str()
    };
    let _ = write!(
        out,
        "  #{:<6} {:<10} {:>3.0}%  {}",
        row.id,
        row.status.as_str(),
        row.progress,
        title
    );
    let marker = match row.intent {
        Intent::Danger => "error",
        Intent::Warning => "warning",
    };
    for error in &row.errors {
        let _ = write!(out, "\n           {marker}: {error}");
    }
}
