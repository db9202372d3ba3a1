//! Pod reconciliation cycle
//!
//! One cycle compares the scheduler's active run states with the containers
//! on the platform and repairs two kinds of drift:
//!
//! - **Missing containers**: an instance is `RUNNING` but no container with
//!   its execution id exists. The instance is sent a run error.
//! - **Orphaned containers**: a container owned by the scheduler whose
//!   instance is no longer active and whose processes have all terminated.
//!   The container is deleted.
//!
//! Both passes share one active-state snapshot taken at the start of the
//! cycle. Neither pass retries within a cycle; anything left undone is
//! picked up again on the next one.

use crate::client::OrchestrationClient;
use crate::debug::DebugOverride;
use crate::error::{ReconcileError, Result};
use crate::metrics::ReconcilerMetrics;
use crate::report::{CycleReport, MissingContainerReport, OrphanReport, SkipReason};
use crate::state::StateManager;
use futures::stream::{self, StreamExt, TryStreamExt};
use podwatch_types::{ActiveStates, Delivery, Event, ExpectedRevision, WorkflowInstance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Message attached to run errors for instances without a container
pub const MISSING_CONTAINER_MESSAGE: &str = "No pod associated with this instance";

/// Reconciler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Upper bound on concurrent single-container lookups
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

fn default_max_concurrent_lookups() -> usize {
    8
}

/// Keeps run state and platform containers consistent
///
/// Cycles must not overlap: callers invoke [`Reconciler::reconcile`] from a
/// single task.
pub struct Reconciler {
    config: ReconcilerConfig,
    client: Arc<dyn OrchestrationClient>,
    state_manager: Arc<dyn StateManager>,
    debug: DebugOverride,
    metrics: Option<Arc<ReconcilerMetrics>>,
}

impl Reconciler {
    /// Create a new reconciler
    pub fn new(
        config: ReconcilerConfig,
        client: Arc<dyn OrchestrationClient>,
        state_manager: Arc<dyn StateManager>,
        debug: DebugOverride,
    ) -> Self {
        Self {
            config,
            client,
            state_manager,
            debug,
            metrics: None,
        }
    }

    /// Record cycle outcomes in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ReconcilerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one reconciliation cycle
    pub async fn reconcile(&self) {
        self.run_cycle().await;
    }

    /// Run one reconciliation cycle and summarize what it did
    #[instrument(skip(self), fields(namespace = %self.client.namespace()))]
    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        match self.state_manager.active_states().await {
            Ok(active) => {
                let debug = self.debug.get();
                report.debug_override = debug;

                match self.detect_missing_containers(&active).await {
                    Ok(missing) => report.missing = Some(missing),
                    Err(e) => {
                        warn!(error = %e, "Skipping missing-container pass");
                    }
                }

                match self.collect_orphans(&active, debug).await {
                    Ok(orphans) => report.orphans = Some(orphans),
                    Err(e) => {
                        warn!(error = %e, "Skipping orphan collection pass");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to read active states, skipping cycle");
            }
        }

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(&report, elapsed);
        }

        debug!(
            outcome = report.outcome(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Reconciliation cycle finished"
        );

        report
    }

    /// Send a run error to every running instance whose container is gone.
    ///
    /// All lookups finish before any event is sent, so a failed lookup
    /// abandons the pass without side effects.
    async fn detect_missing_containers(
        &self,
        active: &ActiveStates,
    ) -> Result<MissingContainerReport> {
        let mut report = MissingContainerReport::default();

        let mut targets = Vec::new();
        for state in active.running() {
            match state.execution_id() {
                Some(execution_id) => {
                    targets.push((state.instance.clone(), execution_id.to_string()))
                }
                None => {
                    warn!(instance = %state.instance, "Running instance has no execution id");
                    report.without_execution_id.push(state.instance.clone());
                }
            }
        }

        if targets.is_empty() {
            return Ok(report);
        }

        report.lookups = targets.len();
        let client = &self.client;
        let lookups: Vec<Option<WorkflowInstance>> = stream::iter(targets)
            .map(|(instance, execution_id)| async move {
                let container = client.get_container(&execution_id).await?;
                Ok::<_, ReconcileError>(container.is_none().then_some(instance))
            })
            .buffer_unordered(self.config.max_concurrent_lookups.max(1))
            .try_collect()
            .await?;
        let mut missing: Vec<WorkflowInstance> = lookups.into_iter().flatten().collect();
        missing.sort();

        for instance in &missing {
            info!(instance = %instance, "No container found for running instance");

            let event = Event::run_error(instance.clone(), MISSING_CONTAINER_MESSAGE);
            match self
                .state_manager
                .receive_ignore_closed(event, ExpectedRevision::Any)
                .await
            {
                Ok(Delivery::Applied) => report.applied += 1,
                Ok(Delivery::DroppedClosed) => {
                    debug!(instance = %instance, "Instance already closed, run error dropped");
                    report.dropped_closed += 1;
                }
                Err(e) => {
                    warn!(instance = %instance, error = %e, "Failed to send run error");
                    report.failed += 1;
                }
            }
        }

        report.missing = missing;
        Ok(report)
    }

    /// Delete finished containers whose owning instance is no longer active
    async fn collect_orphans(&self, active: &ActiveStates, debug: bool) -> Result<OrphanReport> {
        let containers = self.client.list_containers().await?;
        let mut report = OrphanReport {
            inspected: containers.len(),
            ..Default::default()
        };

        for container in containers {
            let Some(owner) = container.owner() else {
                report.skip(SkipReason::Foreign);
                continue;
            };

            if !container.all_terminated() {
                report.skip(SkipReason::NotTerminated);
                continue;
            }

            if active.contains(&owner) {
                report.skip(SkipReason::OwnerActive);
                continue;
            }

            if debug {
                debug!(container = %container.name, owner = %owner, "Debug override enabled, keeping container");
                report.skip(SkipReason::DebugOverride);
                continue;
            }

            // The snapshot may predate a relaunch of the same instance.
            match self.state_manager.active_state(&owner).await {
                Ok(Some(_)) => {
                    report.skip(SkipReason::OwnerActive);
                    continue;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(container = %container.name, owner = %owner, error = %e, "Failed to read owner state");
                    report.skip(SkipReason::OwnerLookupFailed);
                    continue;
                }
            }

            info!(container = %container.name, owner = %owner, "Deleting orphaned container");
            match self.client.delete_container(&container.name).await {
                Ok(()) => report.deleted.push(container.name),
                Err(e) => {
                    warn!(container = %container.name, error = %e, "Failed to delete orphaned container");
                    report.delete_failures.push(container.name);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryPlatform, InMemoryStateManager, StateCall};
    use podwatch_types::{
        ContainerObservation, RunPhase, RunState, StateData, SubStatus, WorkflowId,
    };

    fn instance(parameter: &str) -> WorkflowInstance {
        WorkflowInstance::new(WorkflowId::new("comp", "wf").unwrap(), parameter).unwrap()
    }

    fn running(parameter: &str, execution_id: &str) -> RunState {
        RunState::new(
            instance(parameter),
            RunPhase::Running,
            StateData::default().with_execution_id(execution_id),
        )
    }

    fn reconciler(
        platform: Arc<InMemoryPlatform>,
        states: Arc<InMemoryStateManager>,
    ) -> Reconciler {
        Reconciler::new(
            ReconcilerConfig::default(),
            platform,
            states,
            DebugOverride::default(),
        )
    }

    #[tokio::test]
    async fn test_running_without_execution_id_is_skipped() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        states
            .upsert(RunState::new(instance("a"), RunPhase::Running, StateData::default()))
            .await;

        let report = reconciler(platform.clone(), states.clone()).run_cycle().await;

        let missing = report.missing.unwrap();
        assert_eq!(missing.lookups, 0);
        assert_eq!(missing.without_execution_id, vec![instance("a")]);
        assert!(platform.calls().await.iter().all(|c| !c.is_get()));
        assert!(states.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_execution_id_is_never_looked_up() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        states.upsert(running("a", "")).await;

        let report = reconciler(platform.clone(), states.clone()).run_cycle().await;

        let missing = report.missing.unwrap();
        assert_eq!(missing.lookups, 0);
        assert_eq!(missing.without_execution_id, vec![instance("a")]);
        assert!(platform.calls().await.iter().all(|c| !c.is_get()));
        assert!(states.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_idle_cycles_retain_nothing_without_call_logs() {
        let platform = Arc::new(InMemoryPlatform::new("default"));
        let states = Arc::new(InMemoryStateManager::new());
        let reconciler = reconciler(platform.clone(), states.clone());

        for _ in 0..1000 {
            reconciler.reconcile().await;
        }

        assert!(platform.calls().await.is_empty());
        assert!(states.calls().await.is_empty());
        assert!(states.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_aborts_pass_without_events() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        states.upsert(running("a", "eid-a")).await;
        states.upsert(running("b", "eid-b")).await;
        platform.fail_get("eid-b").await;

        let report = reconciler(platform, states.clone()).run_cycle().await;

        assert!(report.missing.is_none());
        assert!(report.orphans.is_some());
        assert_eq!(report.outcome(), "partial");
        assert!(states.received().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts_cycle() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        states.fail_snapshots(true);

        let report = reconciler(platform.clone(), states).run_cycle().await;

        assert_eq!(report.outcome(), "aborted");
        assert!(platform.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream_drop_is_counted() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        states.upsert(running("a", "eid-a")).await;
        // The instance closes after the snapshot is served.
        states.close_after_snapshot(instance("a")).await;

        let report = reconciler(platform, states).run_cycle().await;

        let missing = report.missing.unwrap();
        assert_eq!(missing.missing, vec![instance("a")]);
        assert_eq!(missing.applied, 0);
        assert_eq!(missing.dropped_closed, 1);
    }

    #[tokio::test]
    async fn test_owner_relaunched_after_snapshot_is_kept() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        platform
            .insert(
                ContainerObservation::new("eid-old")
                    .owned_by(&instance("a"))
                    .with_sub_status(SubStatus::terminated("eid-old")),
            )
            .await;
        // Not in the snapshot, but active by the time the owner is checked.
        states.activate_after_snapshot(running("a", "eid-new")).await;

        let report = reconciler(platform.clone(), states.clone()).run_cycle().await;

        let orphans = report.orphans.unwrap();
        assert!(orphans.deleted.is_empty());
        assert_eq!(orphans.skipped_for(SkipReason::OwnerActive), 1);
        assert!(platform.contains("eid-old").await);
        assert!(states
            .calls()
            .await
            .contains(&StateCall::ActiveState(instance("a"))));
    }

    #[tokio::test]
    async fn test_owner_lookup_failure_keeps_container() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        platform
            .insert(
                ContainerObservation::new("eid-a")
                    .owned_by(&instance("a"))
                    .with_sub_status(SubStatus::terminated("eid-a")),
            )
            .await;
        states.fail_single_lookups(true);

        let report = reconciler(platform.clone(), states).run_cycle().await;

        let orphans = report.orphans.unwrap();
        assert_eq!(orphans.skipped_for(SkipReason::OwnerLookupFailed), 1);
        assert!(platform.contains("eid-a").await);
    }

    #[tokio::test]
    async fn test_zero_concurrency_limit_is_clamped() {
        let platform = Arc::new(InMemoryPlatform::new("default").with_call_log());
        let states = Arc::new(InMemoryStateManager::new().with_call_log());
        for i in 0..5 {
            states
                .upsert(running(&format!("p{i}"), &format!("eid-{i}")))
                .await;
        }

        let reconciler = Reconciler::new(
            ReconcilerConfig {
                max_concurrent_lookups: 0,
            },
            platform,
            states.clone(),
            DebugOverride::default(),
        );
        let report = reconciler.run_cycle().await;

        let missing = report.missing.unwrap();
        assert_eq!(missing.lookups, 5);
        assert_eq!(missing.applied, 5);
        assert_eq!(states.received().await.len(), 5);
    }
}
