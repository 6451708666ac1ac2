use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use common::{RunState, SchedulerCommand};

use crate::observer::{LogObserver, TradeObserver};
use crate::trader::TraderEngine;

/// Cloneable handle used to control a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    pair: String,
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: Arc<RwLock<RunState>>,
}

impl SchedulerHandle {
    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub async fn send(&self, cmd: SchedulerCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(pair = %self.pair, command = ?cmd, "Scheduler already gone");
        }
    }

    pub async fn state(&self) -> RunState {
        *self.state.read().await
    }
}

/// Drives one `TraderEngine` at a fixed cadence.
///
/// Ticks run inline in the scheduler task, so a slow tick delays the next one
/// instead of overlapping it.
pub struct Scheduler<O = LogObserver> {
    engine: TraderEngine,
    period: Duration,
    observer: O,
    state: Arc<RwLock<RunState>>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl<O: TradeObserver> Scheduler<O> {
    pub fn new(engine: TraderEngine, observer: O) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let state = Arc::new(RwLock::new(RunState::Stopped));
        let period = Duration::from_millis(engine.config().tick_interval_ms.max(1));

        let handle = SchedulerHandle {
            pair: engine.pair().to_string(),
            command_tx,
            state: state.clone(),
        };

        let scheduler = Scheduler {
            engine,
            period,
            observer,
            state,
            command_rx,
        };

        (scheduler, handle)
    }

    /// Tick until stopped. Hands the engine back so its final state can be
    /// inspected. Call from `tokio::spawn`.
    pub async fn run(mut self) -> TraderEngine {
        let pair = self.engine.pair().to_string();
        info!(pair = %pair, period = ?self.period, "Scheduler running");
        *self.state.write().await = RunState::Running;

        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(SchedulerCommand::Pause) => {
                        let mut state = self.state.write().await;
                        if *state == RunState::Running {
                            info!(pair = %pair, "Scheduler paused");
                            *state = RunState::Paused;
                        }
                    }
                    Some(SchedulerCommand::Resume) => {
                        let mut state = self.state.write().await;
                        if *state == RunState::Paused {
                            info!(pair = %pair, "Scheduler resumed");
                            *state = RunState::Running;
                        }
                    }
                    Some(SchedulerCommand::Stop) => {
                        info!(pair = %pair, "Scheduler stopping");
                        break;
                    }
                    None => {
                        warn!(pair = %pair, "Scheduler command channel closed, shutting down");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    if *self.state.read().await == RunState::Running {
                        self.run_tick().await;
                    }
                }
            }
        }

        *self.state.write().await = RunState::Stopped;
        self.engine
    }

    /// Run a single tick and report its outcome to the observer.
    pub async fn run_tick(&mut self) {
        match self.engine.tick().await {
            Ok(events) => {
                let pair = self.engine.pair();
                for event in &events {
                    self.observer.on_event(pair, event);
                }
            }
            Err(e) => self.observer.on_tick_error(self.engine.pair(), &e),
        }
    }
}
