//! Refresh Scheduler
//!
//! Single periodic driver for the dashboard. Each tick starts a data refresh
//! (unless the previous one is still running), evaluates the autotrade
//! schedule against the latest stored configuration and asks the UI to
//! redraw. Ticks are awaited one after another; only the data refresh runs
//! in the background.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::autotrade::AutotradeController;
use super::dispatcher::CommandDispatcher;
use super::log_sink::LogSink;
use crate::domain::ScheduleDecision;
use crate::ports::DashboardPort;

/// Default time between ticks
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// What a single tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// False when the previous refresh was still in flight
    pub refresh_started: bool,
    pub decision: ScheduleDecision,
    /// True when a due trade was handed to a spawned process
    pub trade_dispatched: bool,
}

/// Scheduler status
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub tick_interval: Duration,
    pub refresh_in_flight: bool,
}

#[derive(Clone)]
pub struct RefreshScheduler {
    dashboard: Arc<dyn DashboardPort>,
    autotrade: AutotradeController,
    dispatcher: CommandDispatcher,
    log: LogSink,
    tick_interval: Duration,
    is_running: Arc<RwLock<bool>>,
    shutdown: Arc<watch::Sender<bool>>,
    refresh_task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl RefreshScheduler {
    pub fn new(
        dashboard: Arc<dyn DashboardPort>,
        autotrade: AutotradeController,
        dispatcher: CommandDispatcher,
        log: LogSink,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            dashboard,
            autotrade,
            dispatcher,
            log,
            tick_interval: DEFAULT_TICK_INTERVAL,
            is_running: Arc::new(RwLock::new(false)),
            shutdown: Arc::new(shutdown),
            refresh_task: Arc::new(Mutex::new(None)),
        }
    }

    /// Set custom tick interval
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Run the tick loop until `stop` is called
    ///
    /// Stopping is final: `run` on a scheduler that was already stopped
    /// returns without ticking.
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        *self.is_running.write().await = true;

        tracing::info!("Starting refresh scheduler, tick interval: {:?}", self.tick_interval);

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow_and_update() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Utc::now().timestamp()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.abort_refresh();
        *self.is_running.write().await = false;
        tracing::info!("Refresh scheduler stopped");
    }

    /// Stop the loop and cancel any in-flight data refresh
    pub async fn stop(&self) {
        tracing::info!("Stopping refresh scheduler");
        self.shutdown.send_replace(true);
        self.abort_refresh();
        *self.is_running.write().await = false;
    }

    /// Execute one scheduler cycle at `now` (unix seconds)
    pub async fn tick(&self, now: i64) -> TickReport {
        let refresh_started = self.start_refresh();

        let decision = match self.autotrade.evaluate_schedule(now).await {
            Ok(decision) => decision,
            Err(e) => {
                self.log.error(format!("Autotrade schedule unavailable: {}", e));
                ScheduleDecision::Wait { seconds_remaining: 0 }
            }
        };

        let trade_dispatched = match &decision {
            ScheduleDecision::Fire { .. } => self.fire(now).await,
            ScheduleDecision::Wait { .. } => false,
        };

        self.dashboard.request_redraw();

        TickReport {
            refresh_started,
            decision,
            trade_dispatched,
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: *self.is_running.read().await,
            tick_interval: self.tick_interval,
            refresh_in_flight: self.refresh_in_flight(),
        }
    }

    /// Claim the due trade, then dispatch exactly what was claimed
    async fn fire(&self, now: i64) -> bool {
        let schedule = match self.autotrade.take_due_trade_at(now).await {
            Ok(Some(schedule)) => schedule,
            Ok(None) => {
                self.log.info("Autotrade schedule changed before firing; nothing dispatched.");
                return false;
            }
            // reported by the controller
            Err(_) => return false,
        };

        self.log.info(format!(
            "Autotrade due: {} {} BTC.",
            schedule.next_trade_side, schedule.next_trade_amount
        ));

        // Dispatch errors are logged by the dispatcher; the schedule is one-shot either way.
        self.dispatcher
            .trade(schedule.next_trade_side, schedule.next_trade_amount)
            .await
            .is_ok()
    }

    fn start_refresh(&self) -> bool {
        let mut slot = match self.refresh_task.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };

        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            tracing::debug!("Previous data refresh still running, skipping");
            return false;
        }

        let dashboard = Arc::clone(&self.dashboard);
        let log = self.log.clone();
        *slot = Some(tokio::spawn(async move {
            if let Err(e) = dashboard.refresh_data().await {
                log.warn(format!("Data refresh failed: {}", e));
            }
        }));
        true
    }

    fn refresh_in_flight(&self) -> bool {
        match self.refresh_task.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|task| !task.is_finished()),
            Err(poisoned) => poisoned
                .into_inner()
                .as_ref()
                .is_some_and(|task| !task.is_finished()),
        }
    }

    fn abort_refresh(&self) {
        let mut slot = match self.refresh_task.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}
