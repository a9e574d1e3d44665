use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use taskwatch_core::TaskRef;
use taskwatch_engine::{EngineHandle, HttpTaskSource};
use taskwatch_logging::watch_info;

use crate::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "taskwatch", about = "Watch background tasks until they finish")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll tasks and print their status until none is running
    Watch(WatchArgs),
    /// Remove one task from the backend
    Remove(RemoveArgs),
}

#[derive(Debug, Args, Clone)]
struct CommonArgs {
    #[arg(long, default_value = "taskwatch.ron")]
    config: PathBuf,
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Args, Clone)]
struct WatchArgs {
    #[command(flatten)]
    common: CommonArgs,
    /// Clear completed tasks on the backend once everything has finished
    #[arg(long)]
    remove_completed: bool,
    #[arg(value_name = "ID:CODE", required = true, value_parser = parse_task_ref)]
    tasks: Vec<TaskRef>,
}

#[derive(Debug, Args, Clone)]
struct RemoveArgs {
    #[command(flatten)]
    common: CommonArgs,
    #[arg(value_name = "ID:CODE", value_parser = parse_task_ref)]
    task: TaskRef,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Watch(args) => {
                let config = setup(&args.common)?;
                crate::watch::run(
                    &config,
                    &args.tasks,
                    args.remove_completed,
                    &mut std::io::stdout(),
                )
                .await
            }
            Command::Remove(args) => {
                let config = setup(&args.common)?;
                let engine = spawn_engine(&config)?;
                let result = engine.remove_task(&args.task).await;
                engine.shutdown();
                result.with_context(|| format!("removing task {}", args.task))?;
                watch_info!("removed task {}", args.task);
                println!("removed {}", args.task);
                Ok(())
            }
        }
    }
}

fn setup(common: &CommonArgs) -> anyhow::Result<AppConfig> {
    let config = AppConfig::load(&common.config)?;
    crate::logging::initialize(config.log, common.verbose);
    Ok(config)
}

pub(crate) fn spawn_engine(config: &AppConfig) -> anyhow::Result<EngineHandle> {
    let source = HttpTaskSource::new(config.source_settings()?)?;
    let engine = EngineHandle::spawn(Arc::new(source), config.engine_settings())?;
    Ok(engine)
}

/// Parses `ID:CODE`, e.g. `42:install`.
fn parse_task_ref(value: &str) -> Result<TaskRef, String> {
    let (id, code) = value
        .split_once(':')
        .ok_or_else(|| format!("expected ID:CODE, got {value:?}"))?;
    let id = id
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid task id {id:?}: {err}"))?;
    let code = code.trim();
    if code.is_empty() {
        return Err(format!("missing task code in {value:?}"));
    }
    Ok(TaskRef::new(id, code))
}
