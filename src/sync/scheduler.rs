//! PollScheduler: fixed-interval gateway polling
//!
//! Runs in a background tokio task. Once at startup and after every edit of
//! the gateway host it performs a full resync; every interval afterwards it
//! fetches the readings and reconciles them incrementally. Cycles never
//! overlap: one requested while another is in flight is skipped, except a
//! skipped resync, which is deferred until the running cycle ends.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::gateway::{FetchOutcome, GatewayClient};
use crate::models::ReconcileReport;
use crate::settings::SettingsStore;
use crate::sync::reconciler::DeviceReconciler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Startup,
    Tick,
    ConfigChange,
    Manual,
}

impl CycleKind {
    /// Startup and host edits take the full device-list path
    fn is_full_sync(self) -> bool {
        matches!(self, CycleKind::Startup | CycleKind::ConfigChange)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Unconfigured,
    Reconciled { report: ReconcileReport },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub kind: CycleKind,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub interval_secs: u64,
    pub retain_stale: bool,
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub cycles_failed: u64,
    pub last_cycle: Option<CycleSummary>,
}

#[derive(Debug, Default)]
struct Stats {
    cycles_run: u64,
    cycles_skipped: u64,
    cycles_failed: u64,
    last_cycle: Option<CycleSummary>,
}

pub struct PollScheduler {
    client: GatewayClient,
    reconciler: DeviceReconciler,
    settings: Arc<SettingsStore>,
    interval: Duration,
    in_flight: AtomicBool,
    /// A full resync was skipped and still has to run
    pending_resync: AtomicBool,
    cycle_done: Notify,
    state: RwLock<SchedulerState>,
    stats: RwLock<Stats>,
}

/// Owns the running poll loop; `shutdown` stops it and waits for the task
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.join.await {
            tracing::error!("[PollScheduler] Poll task ended abnormally: {}", e);
        }
    }
}

/// Clears the in-flight flag when a cycle ends, including on panic
struct InFlight<'a> {
    flag: &'a AtomicBool,
    done: &'a Notify,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.done.notify_one();
    }
}

impl PollScheduler {
    pub fn new(
        client: GatewayClient,
        reconciler: DeviceReconciler,
        settings: Arc<SettingsStore>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            reconciler,
            settings,
            interval,
            in_flight: AtomicBool::new(false),
            pending_resync: AtomicBool::new(false),
            cycle_done: Notify::new(),
            state: RwLock::new(SchedulerState::Idle),
            stats: RwLock::new(Stats::default()),
        }
    }

    /// Start the poll loop in a background task.
    ///
    /// Dropping the returned handle without calling `shutdown` also stops
    /// the loop.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown_tx, join }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        *self.state.write().await = SchedulerState::Polling;
        tracing::info!(
            "[PollScheduler] Starting background polling (interval: {}s)",
            self.interval.as_secs()
        );

        // Subscribe before the first cycle so an edit made meanwhile is not lost
        let mut config_rx = self.settings.subscribe();

        self.run_cycle(CycleKind::Startup).await;

        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    self.run_cycle(CycleKind::Tick).await;
                }
                changed = config_rx.changed() => {
                    if changed.is_err() {
                        tracing::warn!("[PollScheduler] Settings store dropped, stopping");
                        break;
                    }
                    tracing::info!("[PollScheduler] Gateway host changed, resyncing devices");
                    self.run_cycle(CycleKind::ConfigChange).await;
                }
                _ = self.cycle_done.notified(), if self.pending_resync.load(Ordering::Acquire) => {
                    // A stale wakeup can arrive while the blocking cycle still runs
                    if !self.in_flight.load(Ordering::Acquire)
                        && self.pending_resync.swap(false, Ordering::AcqRel)
                    {
                        tracing::info!("[PollScheduler] Running deferred resync");
                        self.run_cycle(CycleKind::ConfigChange).await;
                    }
                }
            }
        }

        *self.state.write().await = SchedulerState::Idle;
        tracing::info!("[PollScheduler] Stopped");
    }

    /// Run one fetch + reconcile cycle unless another one is in flight
    pub async fn run_cycle(&self, kind: CycleKind) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("[PollScheduler] Previous cycle still running, skipping {:?}", kind);
            if kind.is_full_sync() {
                self.pending_resync.store(true, Ordering::Release);
            }
            self.stats.write().await.cycles_skipped += 1;
            return CycleOutcome::Skipped;
        }
        let _guard = InFlight {
            flag: &self.in_flight,
            done: &self.cycle_done,
        };

        let started_at = Utc::now();
        let start = Instant::now();

        tracing::info!("[PollScheduler] Polling data for Ecowitt Soil Moisture Sensors");
        let config = self.settings.gateway_config();

        let outcome = match self.client.fetch_readings(&config).await {
            Ok(FetchOutcome::Unconfigured) => {
                tracing::info!("[PollScheduler] No devices configured.");
                CycleOutcome::Unconfigured
            }
            Ok(FetchOutcome::Readings(readings)) => {
                let report = if kind.is_full_sync() {
                    self.reconciler.resync(&readings).await
                } else {
                    self.reconciler.reconcile(&readings).await
                };
                if report.is_noop() {
                    tracing::debug!("[PollScheduler] {} channels, no device changes", readings.len());
                }
                CycleOutcome::Reconciled { report }
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::warn!("[PollScheduler] Error while polling Ecowitt devices: {}", e);
                } else {
                    tracing::error!("[PollScheduler] Error while polling Ecowitt devices: {}", e);
                }
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let mut stats = self.stats.write().await;
        stats.cycles_run += 1;
        if matches!(outcome, CycleOutcome::Failed { .. }) {
            stats.cycles_failed += 1;
        }
        stats.last_cycle = Some(CycleSummary {
            kind,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            outcome: outcome.clone(),
        });

        outcome
    }

    pub async fn status(&self) -> SchedulerStatus {
        let stats = self.stats.read().await;
        SchedulerStatus {
            state: *self.state.read().await,
            interval_secs: self.interval.as_secs(),
            retain_stale: self.reconciler.retain_stale(),
            cycles_run: stats.cycles_run,
            cycles_skipped: stats.cycles_skipped,
            cycles_failed: stats.cycles_failed,
            last_cycle: stats.last_cycle.clone(),
        }
    }
}
