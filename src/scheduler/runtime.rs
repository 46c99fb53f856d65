//! Tokio host for the scheduler
//!
//! The scheduler lives on one task. Host lifecycle events, provider
//! deliveries and upload triggers arrive as commands over an unbounded
//! channel; timers post their expiry on a second channel. Both are drained
//! by a single `select!` loop, so no two events are ever applied at once.

use crate::api::{CallbackHandle, EventCallback, EventDispatcher, TrackerError, TrackerResult};
use crate::budget::ExecutionBudgetPool;
use crate::core::Fix;
use crate::host::{LocationProvider, ProviderErrorKind, UploadTransport};
use crate::scheduler::{DutyCycleScheduler, SchedulerSnapshot, TimerDriver, TimerHandle, TimerKind};
use crate::utils::{ConfigError, TrackerConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

#[derive(Debug)]
enum Command {
    Start,
    Stop,
    EnteredBackground,
    Fixes(Vec<Fix>),
    ProviderError(ProviderErrorKind),
    UploadCycle,
    Snapshot(oneshot::Sender<SchedulerSnapshot>),
    Shutdown,
}

/// [`TimerDriver`] backed by `tokio::time::sleep` tasks
pub struct TokioTimers {
    /// Expired handles go back to the runtime loop here
    fired_tx: mpsc::UnboundedSender<TimerHandle>,
    /// Sleep task per armed timer, aborted on cancel
    tasks: HashMap<TimerHandle, JoinHandle<()>>,
    next_id: u64,
}

impl TokioTimers {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerHandle>) -> Self {
        Self {
            fired_tx,
            tasks: HashMap::new(),
            next_id: 0,
        }
    }
}

impl TimerDriver for TokioTimers {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.tasks.retain(|_, task| !task.is_finished());

        self.next_id += 1;
        let handle = TimerHandle::new(self.next_id);
        let fired_tx = self.fired_tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(timer = handle.id(), ?kind, "timer fired");
            // Receiver gone means the runtime has shut down
            let _ = fired_tx.send(handle);
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Cloneable front door to a running scheduler.
///
/// Control calls are fire-and-forget; once the runtime has exited they are
/// dropped with a warning.
#[derive(Clone)]
pub struct SchedulerHandle {
    /// Closed once the runtime task has exited
    commands: mpsc::UnboundedSender<Command>,
    /// Same dispatcher the scheduler emits on
    events: Arc<EventDispatcher>,
}

impl SchedulerHandle {
    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            warn!("scheduler runtime has exited, command dropped");
        }
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Host lifecycle notification: the process moved to the background
    pub fn entered_background(&self) {
        self.send(Command::EnteredBackground);
    }

    /// Provider delivery callback
    pub fn deliver_fixes(&self, fixes: Vec<Fix>) {
        self.send(Command::Fixes(fixes));
    }

    /// Provider error callback
    pub fn provider_error(&self, kind: ProviderErrorKind) {
        self.send(Command::ProviderError(kind));
    }

    /// Select the cycle's best fix and hand it to the upload transport.
    /// The upload outcome is logged, never retried.
    pub fn upload_cycle(&self) {
        self.send(Command::UploadCycle);
    }

    pub async fn snapshot(&self) -> TrackerResult<SchedulerSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(reply_tx))
            .map_err(|_| TrackerError::SchedulerClosed)?;
        reply_rx.await.map_err(|_| TrackerError::SchedulerClosed)
    }

    /// Stop sampling and end the runtime task
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn register_callback(&self, callback: EventCallback) -> CallbackHandle {
        self.events.register(callback)
    }

    pub fn unregister_callback(&self, handle: CallbackHandle) -> bool {
        self.events.unregister(handle)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Owns a [`DutyCycleScheduler`] on its own tokio task
pub struct SchedulerRuntime {
    scheduler: DutyCycleScheduler<TokioTimers>,
    /// Receives the fix chosen by each upload cycle
    uploader: Arc<dyn UploadTransport>,
    /// Period of the built-in upload trigger, if any
    upload_interval: Option<Duration>,
    /// Control commands from every [`SchedulerHandle`]
    commands: mpsc::UnboundedReceiver<Command>,
    /// Timer expiries from [`TokioTimers`]
    fired: mpsc::UnboundedReceiver<TimerHandle>,
}

impl SchedulerRuntime {
    /// Spawn the runtime on the current tokio runtime.
    ///
    /// The task ends on [`SchedulerHandle::shutdown`] or once every handle
    /// has been dropped, stopping the provider on the way out. An invalid
    /// `config` is rejected before anything is spawned.
    pub fn spawn(
        config: TrackerConfig,
        provider: Arc<dyn LocationProvider>,
        pool: Arc<ExecutionBudgetPool>,
        events: Arc<EventDispatcher>,
        uploader: Arc<dyn UploadTransport>,
    ) -> Result<(SchedulerHandle, JoinHandle<()>), ConfigError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();

        let upload_interval = config.upload_interval();
        let scheduler = DutyCycleScheduler::new(
            config,
            provider,
            pool,
            Arc::clone(&events),
            TokioTimers::new(fired_tx),
        )?;
        let runtime = SchedulerRuntime {
            scheduler,
            uploader,
            upload_interval,
            commands: command_rx,
            fired: fired_rx,
        };
        let task = tokio::spawn(runtime.run());

        let handle = SchedulerHandle {
            commands: command_tx,
            events,
        };
        Ok((handle, task))
    }

    async fn run(mut self) {
        info!(upload_interval = ?self.upload_interval, "scheduler runtime started");
        let mut upload_ticker = self.upload_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(handle) = self.fired.recv() => self.scheduler.on_timer_fired(handle),
                _ = next_tick(&mut upload_ticker) => self.upload_cycle(),
            }
        }

        self.scheduler.stop();
        info!("scheduler runtime stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start => self.scheduler.start(),
            Command::Stop => self.scheduler.stop(),
            Command::EnteredBackground => self.scheduler.on_enter_background(),
            Command::Fixes(fixes) => self.scheduler.on_fixes_delivered(fixes),
            Command::ProviderError(kind) => self.scheduler.on_provider_error(kind),
            Command::UploadCycle => self.upload_cycle(),
            Command::Snapshot(reply) => {
                let _ = reply.send(self.scheduler.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn upload_cycle(&mut self) {
        let fix = self.scheduler.take_upload_fix();
        let uploader = Arc::clone(&self.uploader);
        let events = self.scheduler.events();

        // Uploads run off the scheduler task so a slow backend never stalls sampling
        tokio::spawn(async move {
            match uploader.upload(fix).await {
                Ok(()) => events.log("Location upload finished"),
                Err(err) => {
                    warn!(error = %err, transient = err.is_transient(), "location upload failed");
                    events.log(format!("Location upload failed: {}", err));
                }
            }
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
