//! Reconciler metrics

use crate::report::CycleReport;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};
use std::time::Duration;

/// Prometheus metrics for reconciliation cycles
pub struct ReconcilerMetrics {
    /// Cycles by outcome
    pub cycles_total: IntCounterVec,

    /// Missing-container run errors by delivery
    pub run_errors_total: IntCounterVec,

    /// Orphan deletions by outcome
    pub orphans_deleted_total: IntCounterVec,

    /// Containers left in place by reason
    pub containers_skipped_total: IntCounterVec,

    /// Cycle duration
    pub cycle_duration_seconds: Histogram,
}

impl ReconcilerMetrics {
    /// Create and register reconciler metrics
    pub fn new(registry: &Registry) -> Self {
        let cycles_total = IntCounterVec::new(
            Opts::new("reconcile_cycles_total", "Reconciliation cycles"),
            &["outcome"],
        )
        .expect("Failed to create reconcile_cycles_total metric");
        registry
            .register(Box::new(cycles_total.clone()))
            .expect("Failed to register reconcile_cycles_total");

        let run_errors_total = IntCounterVec::new(
            Opts::new(
                "run_errors_total",
                "Run errors sent for instances without a container",
            ),
            &["delivery"],
        )
        .expect("Failed to create run_errors_total metric");
        registry
            .register(Box::new(run_errors_total.clone()))
            .expect("Failed to register run_errors_total");

        let orphans_deleted_total = IntCounterVec::new(
            Opts::new("orphans_deleted_total", "Orphaned container deletions"),
            &["outcome"],
        )
        .expect("Failed to create orphans_deleted_total metric");
        registry
            .register(Box::new(orphans_deleted_total.clone()))
            .expect("Failed to register orphans_deleted_total");

        let containers_skipped_total = IntCounterVec::new(
            Opts::new(
                "containers_skipped_total",
                "Containers left in place by the orphan pass",
            ),
            &["reason"],
        )
        .expect("Failed to create containers_skipped_total metric");
        registry
            .register(Box::new(containers_skipped_total.clone()))
            .expect("Failed to register containers_skipped_total");

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("reconcile_duration_seconds", "Reconciliation cycle duration")
                .buckets(vec![0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )
        .expect("Failed to create reconcile_duration_seconds metric");
        registry
            .register(Box::new(cycle_duration_seconds.clone()))
            .expect("Failed to register reconcile_duration_seconds");

        Self {
            cycles_total,
            run_errors_total,
            orphans_deleted_total,
            containers_skipped_total,
            cycle_duration_seconds,
        }
    }

    /// Record the outcome of a finished cycle
    pub fn record_cycle(&self, report: &CycleReport, duration: Duration) {
        self.cycles_total
            .with_label_values(&[report.outcome()])
            .inc();
        self.cycle_duration_seconds.observe(duration.as_secs_f64());

        if let Some(missing) = &report.missing {
            self.run_errors_total
                .with_label_values(&["applied"])
                .inc_by(missing.applied as u64);
            self.run_errors_total
                .with_label_values(&["dropped_closed"])
                .inc_by(missing.dropped_closed as u64);
            self.run_errors_total
                .with_label_values(&["failed"])
                .inc_by(missing.failed as u64);
        }

        if let Some(orphans) = &report.orphans {
            self.orphans_deleted_total
                .with_label_values(&["success"])
                .inc_by(orphans.deleted.len() as u64);
            self.orphans_deleted_total
                .with_label_values(&["failure"])
                .inc_by(orphans.delete_failures.len() as u64);
            for (reason, count) in &orphans.skipped {
                self.containers_skipped_total
                    .with_label_values(&[reason.as_str()])
                    .inc_by(*count as u64);
            }
        }
    }
}
