//! Periodic reconciliation loop
//!
//! A single task owns the reconciler, so cycles never overlap. Cycles run
//! on a fixed interval and on demand through [`Scheduler::trigger_reconcile`].

use chrono::{DateTime, Utc};
use podwatch_reconciler::{CycleReport, Reconciler};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// The most recent finished cycle
#[derive(Debug, Clone, Serialize)]
pub struct LastCycle {
    pub finished_at: DateTime<Utc>,
    pub report: CycleReport,
}

/// Scheduler state
pub struct Scheduler {
    interval: Duration,
    reconciler: Arc<Reconciler>,
    reconcile_tx: mpsc::Sender<()>,
    running: Arc<RwLock<bool>>,
    last_cycle: RwLock<Option<LastCycle>>,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new(
        interval: Duration,
        reconciler: Arc<Reconciler>,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        // One pending trigger is enough; further requests coalesce into it.
        let (reconcile_tx, reconcile_rx) = mpsc::channel(1);

        let scheduler = Arc::new(Self {
            interval,
            reconciler,
            reconcile_tx,
            running: Arc::new(RwLock::new(false)),
            last_cycle: RwLock::new(None),
        });

        (scheduler, reconcile_rx)
    }

    /// Request an immediate cycle.
    ///
    /// Returns `false` when a request is already pending.
    pub fn trigger_reconcile(&self) -> bool {
        self.reconcile_tx.try_send(()).is_ok()
    }

    pub async fn last_cycle(&self) -> Option<LastCycle> {
        self.last_cycle.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run the loop until stopped or the trigger channel closes
    pub async fn start(self: Arc<Self>, mut reconcile_rx: mpsc::Receiver<()>) {
        {
            let mut running = self.running.write().await;
            *running = true;
        }

        tracing::info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                Some(_) = reconcile_rx.recv() => {
                    tracing::debug!("Running triggered reconciliation");
                    self.run_once().await;
                }
                else => break,
            }

            if !*self.running.read().await {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop the scheduler after the current cycle
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    async fn run_once(&self) -> CycleReport {
        let report = self.reconciler.run_cycle().await;

        if let Some(missing) = &report.missing {
            if !missing.missing.is_empty() {
                tracing::info!(
                    missing = missing.missing.len(),
                    applied = missing.applied,
                    dropped_closed = missing.dropped_closed,
                    "Reported instances without a container"
                );
            }
        }
        if let Some(orphans) = &report.orphans {
            if !orphans.deleted.is_empty() || !orphans.delete_failures.is_empty() {
                tracing::info!(
                    deleted = orphans.deleted.len(),
                    failed = orphans.delete_failures.len(),
                    "Collected orphaned containers"
                );
            }
        }

        let mut last_cycle = self.last_cycle.write().await;
        *last_cycle = Some(LastCycle {
            finished_at: Utc::now(),
            report: report.clone(),
        });
        report
    }
}
