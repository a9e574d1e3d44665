use std::collections::BTreeSet;
use std::io::Write;

use anyhow::{bail, Context};
use chrono::Local;
use taskwatch_core::{TaskId, TaskRef, TaskRegistry};
use taskwatch_engine::PollerStatus;
use taskwatch_logging::{watch_info, watch_warn};

use crate::config::AppConfig;
use crate::render::render_view;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// Some requested task has not reached the registry yet, or the poller
    /// is still running.
    Waiting,
    /// Everything requested is in and nothing is running.
    Finished,
    /// The poller gave up (fetch failure) with tasks still running.
    Stalled { running: usize },
}

fn progress(registry: &TaskRegistry, status: &PollerStatus, wanted: &BTreeSet<TaskId>) -> Progress {
    if !wanted.iter().all(|id| registry.contains(*id)) || status.active {
        return Progress::Waiting;
    }
    match registry.active_tasks().len() {
        0 => Progress::Finished,
        running => Progress::Stalled { running },
    }
}

/// Fetches `tasks`, hands them to the engine and prints the task panel on
/// every registry change to `out` until nothing is left running.
pub async fn run<W: Write>(
    config: &AppConfig,
    tasks: &[TaskRef],
    remove_completed: bool,
    out: &mut W,
) -> anyhow::Result<()> {
    let engine = crate::cli::spawn_engine(config)?;

    let fetched = engine.fetch_tasks(tasks).await;
    if fetched.is_empty() {
        engine.shutdown();
        bail!("none of the {} requested task(s) could be fetched", tasks.len());
    }
    let wanted: BTreeSet<TaskId> = fetched.iter().map(|task| task.id).collect();
    watch_info!("watching {} task(s)", wanted.len());

    let mut registry_rx = engine.subscribe();
    let mut status_rx = engine.subscribe_status();
    writeln!(out, "{}", render_view(&registry_rx.borrow_and_update().view(), Local::now()))?;

    loop {
        let state = {
            let registry = registry_rx.borrow();
            let status = status_rx.borrow_and_update();
            progress(&registry, &status, &wanted)
        };
        match state {
            Progress::Waiting => {}
            Progress::Finished => {
                // The last registry change may still be unprinted when the
                // status change won the race.
                if registry_rx.has_changed().unwrap_or(false) {
                    writeln!(out, "{}", render_view(&registry_rx.borrow_and_update().view(), Local::now()))?;
                }
                break;
            }
            Progress::Stalled { running } => {
                engine.shutdown();
                bail!("polling stopped with {running} task(s) still running");
            }
        }

        tokio::select! {
            changed = registry_rx.changed() => {
                changed.context("engine stopped")?;
                writeln!(out, "{}", render_view(&registry_rx.borrow_and_update().view(), Local::now()))?;
            }
            changed = status_rx.changed() => changed.context("engine stopped")?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                watch_warn!("interrupted");
                engine.shutdown();
                return Ok(());
            }
        }
    }

    if remove_completed {
        let removed = engine
            .remove_completed_tasks()
            .await
            .context("removing completed tasks")?;
        writeln!(out, "removed {} completed task(s)", removed.len())?;
    }
    engine.shutdown();
    Ok(())
}
