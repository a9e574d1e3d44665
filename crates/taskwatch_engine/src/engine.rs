use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use futures_util::future::{BoxFuture, FutureExt};
use taskwatch_core::{
    poll_update, reduce, Action, PollEffect, PollMsg, PollerState, TaskMiddleware, TaskRegistry,
    TaskSnapshot,
};
use taskwatch_logging::{set_poll_cycle, watch_debug, watch_info, watch_trace, watch_warn};
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tokio_util::sync::CancellationToken;

use crate::settings::{EngineSettings, SettingsError};
use crate::source::TaskSource;
use crate::types::{EngineError, PollerStatus};
use crate::FetchError;

enum EngineCommand {
    Dispatch(Action),
    StartPolling(TaskSnapshot),
    StopPolling,
}

type FetchResult = (u64, Result<Vec<TaskSnapshot>, FetchError>);

static SHARED: Mutex<Option<EngineHandle>> = Mutex::new(None);

/// Cloneable handle to the engine task that owns the task registry and the
/// poller. All handles talk to the same engine through one command channel.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
    registry_rx: watch::Receiver<TaskRegistry>,
    status_rx: watch::Receiver<PollerStatus>,
    pub(crate) source: Arc<dyn TaskSource>,
    shutdown: CancellationToken,
    shared: bool,
}

impl EngineHandle {
    /// Spawns a new engine on the current tokio runtime.
    ///
    /// Every call starts an independent engine with its own registry and
    /// poller; the caller owns it and must not spawn a second one for the
    /// same backend. The engine lives as long as that runtime does.
    /// [`EngineHandle::shared`] is the process-wide alternative.
    pub fn spawn(
        source: Arc<dyn TaskSource>,
        settings: EngineSettings,
    ) -> Result<Self, SettingsError> {
        Self::spawn_with_registry(source, settings, TaskRegistry::new())
    }

    /// Like [`EngineHandle::spawn`], with tasks already known at startup.
    /// Seeded tasks are not polled until someone asks for it, see
    /// [`EngineHandle::poll_tasks`].
    pub fn spawn_with_registry(
        source: Arc<dyn TaskSource>,
        settings: EngineSettings,
        registry: TaskRegistry,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let (handle, engine) = Self::build(source, settings, registry, false);
        tokio::spawn(engine);
        Ok(handle)
    }

    /// The process-wide engine. The first call starts it; every later call
    /// returns that same engine and ignores its arguments, so two parts of
    /// an application can never end up with competing pollers.
    ///
    /// The shared engine runs on a runtime of its own, on a dedicated
    /// thread, so it outlives the runtime of whoever created it. It cannot
    /// be shut down: [`EngineHandle::shutdown`] is a no-op on it.
    pub fn shared(
        source: Arc<dyn TaskSource>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let mut shared = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(engine) = shared.as_ref() {
            return Ok(engine.clone());
        }

        settings.validate()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        let (handle, engine) = Self::build(source, settings, TaskRegistry::new(), true);
        thread::Builder::new()
            .name("taskwatch-engine".to_string())
            .spawn(move || runtime.block_on(engine))
            .map_err(EngineError::Runtime)?;

        watch_info!("shared engine started");
        *shared = Some(handle.clone());
        Ok(handle)
    }

    fn build(
        source: Arc<dyn TaskSource>,
        settings: EngineSettings,
        registry: TaskRegistry,
        shared: bool,
    ) -> (Self, impl Future<Output = ()> + Send + 'static) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (registry_tx, registry_rx) = watch::channel(registry.clone());
        let (status_tx, status_rx) = watch::channel(PollerStatus::default());
        let shutdown = CancellationToken::new();

        let engine = EngineLoop {
            registry,
            poller: PollerState::new(settings.poll_interval),
            middleware: TaskMiddleware::new(settings.task_actions),
            source: Arc::clone(&source),
            self_tx: cmd_tx.downgrade(),
            registry_tx,
            status_tx,
            timer: None,
            in_flight: None,
        };
        let handle = Self {
            cmd_tx,
            registry_rx,
            status_rx,
            source,
            shutdown: shutdown.clone(),
            shared,
        };
        (handle, engine.run(cmd_rx, shutdown))
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            watch_warn!("engine has stopped, command dropped");
        }
    }

    /// False once the engine loop has ended, after [`EngineHandle::shutdown`]
    /// or when its runtime went away.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Sends an action through the store: reducer first, then middleware.
    pub fn dispatch(&self, action: Action) {
        self.send(EngineCommand::Dispatch(action));
    }

    pub fn start_polling(&self, task: TaskSnapshot) {
        self.send(EngineCommand::StartPolling(task));
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    /// Current registry contents.
    pub fn tasks(&self) -> TaskRegistry {
        self.registry_rx.borrow().clone()
    }

    /// Receiver notified on every real registry change.
    pub fn subscribe(&self) -> watch::Receiver<TaskRegistry> {
        self.registry_rx.clone()
    }

    pub fn poller_status(&self) -> PollerStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PollerStatus> {
        self.status_rx.clone()
    }

    /// Stops the engine task. Pending commands are dropped. Ignored on the
    /// shared engine, which other parts of the process still rely on.
    pub fn shutdown(&self) {
        if self.shared {
            watch_debug!("shutdown ignored on the shared engine");
            return;
        }
        self.shutdown.cancel();
    }
}

/// The engine task. Owns everything the poller touches, so commands, timer
/// ticks and fetch completions are handled strictly one after another.
struct EngineLoop {
    registry: TaskRegistry,
    poller: PollerState,
    middleware: TaskMiddleware,
    source: Arc<dyn TaskSource>,
    // Weak, so that dropping every handle ends the loop.
    self_tx: mpsc::WeakUnboundedSender<EngineCommand>,
    registry_tx: watch::Sender<TaskRegistry>,
    status_tx: watch::Sender<PollerStatus>,
    timer: Option<Pin<Box<Sleep>>>,
    in_flight: Option<BoxFuture<'static, FetchResult>>,
}

impl EngineLoop {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<EngineCommand>,
        shutdown: CancellationToken,
    ) {
        watch_debug!("engine loop started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                command = cmd_rx.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                (epoch, result) = wait_fetch(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.fetch_completed(epoch, result);
                }
                () = wait_timer(&mut self.timer) => {
                    self.timer = None;
                    self.step(PollMsg::TimerFired);
                }
            }
        }
        watch_debug!("engine loop stopped");
    }

    fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Dispatch(action) => self.dispatch(action),
            EngineCommand::StartPolling(task) => self.step(PollMsg::Start(task)),
            EngineCommand::StopPolling => self.step(PollMsg::Stop),
        }
    }

    fn dispatch(&mut self, action: Action) {
        watch_trace!("dispatch {}", action.kind());
        let poll = self.middleware.task_to_poll(&action).cloned();

        let registry = std::mem::take(&mut self.registry);
        self.registry = reduce(registry, action);
        if self.registry.consume_dirty() {
            self.registry_tx.send_replace(self.registry.clone());
        }

        if let Some(task) = poll {
            self.step(PollMsg::Start(task));
        }
    }

    fn step(&mut self, msg: PollMsg) {
        let was_active = self.poller.is_active();
        let poller = std::mem::take(&mut self.poller);
        let (poller, effects) = poll_update(poller, msg, &self.registry);
        self.poller = poller;

        for effect in effects {
            self.run_effect(effect);
        }

        match (was_active, self.poller.is_active()) {
            (false, true) => watch_info!(
                "polling started for {} task(s), every {:?}",
                self.poller.tracked_ids().len(),
                self.poller.interval()
            ),
            (true, false) => watch_info!("polling stopped"),
            _ => {}
        }
        self.publish_status();
    }

    fn run_effect(&mut self, effect: PollEffect) {
        match effect {
            PollEffect::DeferDispatch(action) => self.defer(action),
            PollEffect::Dispatch(action) => self.dispatch(action),
            PollEffect::ScheduleTimer { after } => {
                self.timer = Some(Box::pin(tokio::time::sleep(after)));
            }
            PollEffect::CancelTimer => self.timer = None,
            PollEffect::Fetch { epoch, tasks } => {
                set_poll_cycle(self.poller.cycles());
                if self.in_flight.is_some() {
                    watch_debug!("dropping stale fetch still in flight");
                }
                watch_debug!("fetching {} task(s)", tasks.len());
                let source = Arc::clone(&self.source);
                self.in_flight = Some(
                    async move {
                        let result = source.fetch_tasks(&tasks).await;
                        (epoch, result)
                    }
                    .boxed(),
                );
            }
        }
    }

    /// Queues the action behind every command already waiting, which is
    /// what "next turn of the loop" means for this engine.
    fn defer(&mut self, action: Action) {
        match self.self_tx.upgrade() {
            Some(tx) => {
                let _ = tx.send(EngineCommand::Dispatch(action));
            }
            // No handle left, so nothing can be queued ahead of it anyway.
            None => self.dispatch(action),
        }
    }

    fn fetch_completed(&mut self, epoch: u64, result: Result<Vec<TaskSnapshot>, FetchError>) {
        if epoch != self.poller.epoch() {
            watch_debug!("stale fetch from epoch {} completed", epoch);
        }
        let msg = match result {
            Ok(tasks) => {
                watch_debug!("received {} task snapshot(s)", tasks.len());
                PollMsg::FetchSucceeded { epoch, tasks }
            }
            Err(err) => {
                watch_warn!("task fetch failed: {}", err);
                PollMsg::FetchFailed {
                    epoch,
                    reason: err.to_string(),
                }
            }
        };
        self.step(msg);
    }

    fn publish_status(&self) {
        let status = PollerStatus {
            tracked: self.poller.tracked_ids().iter().copied().collect(),
            active: self.poller.is_active(),
            cycles: self.poller.cycles(),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

async fn wait_fetch(in_flight: &mut Option<BoxFuture<'static, FetchResult>>) -> FetchResult {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}
