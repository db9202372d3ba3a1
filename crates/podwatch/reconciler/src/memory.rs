//! In-memory collaborators
//!
//! [`InMemoryPlatform`] and [`InMemoryStateManager`] back the daemon's
//! development mode and the tests. Both can keep a log of every call they
//! receive, enabled with `with_call_log`, and can be told to fail specific
//! operations. Accepted events are kept in a bounded history.

use crate::client::OrchestrationClient;
use crate::error::{PlatformError, PlatformResult, StateError, StateResult};
use crate::state::StateManager;
use async_trait::async_trait;
use chrono::Utc;
use podwatch_types::{
    ActiveStates, ContainerObservation, Delivery, Event, ExpectedRevision, RunPhase, RunState,
    WorkflowInstance,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Number of accepted events [`InMemoryStateManager`] retains by default
pub const DEFAULT_EVENT_HISTORY: usize = 256;

/// A call received by [`InMemoryPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    List,
    Get(String),
    Delete(String),
}

impl PlatformCall {
    pub fn is_get(&self) -> bool {
        matches!(self, PlatformCall::Get(_))
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, PlatformCall::Delete(_))
    }
}

/// In-memory orchestration platform for development and testing
#[derive(Debug)]
pub struct InMemoryPlatform {
    namespace: String,
    containers: RwLock<BTreeMap<String, ContainerObservation>>,
    calls: RwLock<Vec<PlatformCall>>,
    call_log: bool,
    hidden_from_list: RwLock<HashSet<String>>,
    failing_gets: RwLock<HashSet<String>>,
    failing_deletes: RwLock<HashSet<String>>,
    fail_list: AtomicBool,
}

impl InMemoryPlatform {
    /// Create an empty platform namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            containers: RwLock::new(BTreeMap::new()),
            calls: RwLock::new(Vec::new()),
            call_log: false,
            hidden_from_list: RwLock::new(HashSet::new()),
            failing_gets: RwLock::new(HashSet::new()),
            failing_deletes: RwLock::new(HashSet::new()),
            fail_list: AtomicBool::new(false),
        }
    }

    /// Keep every call received from now on; see [`InMemoryPlatform::calls`]
    pub fn with_call_log(mut self) -> Self {
        self.call_log = true;
        self
    }

    pub async fn insert(&self, container: ContainerObservation) {
        let mut containers = self.containers.write().await;
        containers.insert(container.name.clone(), container);
    }

    pub async fn remove(&self, name: &str) -> bool {
        let mut containers = self.containers.write().await;
        containers.remove(name).is_some()
    }

    pub async fn contains(&self, name: &str) -> bool {
        let containers = self.containers.read().await;
        containers.contains_key(name)
    }

    pub async fn containers(&self) -> Vec<ContainerObservation> {
        let containers = self.containers.read().await;
        containers.values().cloned().collect()
    }

    /// Every call received so far, in order; empty without a call log
    pub async fn calls(&self) -> Vec<PlatformCall> {
        self.calls.read().await.clone()
    }

    /// Names passed to delete, in order
    pub async fn deletes(&self) -> Vec<String> {
        let calls = self.calls.read().await;
        calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::Delete(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Leave `name` out of listings while still serving it by name
    pub async fn hide_from_list(&self, name: impl Into<String>) {
        self.hidden_from_list.write().await.insert(name.into());
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    pub async fn fail_get(&self, name: impl Into<String>) {
        self.failing_gets.write().await.insert(name.into());
    }

    pub async fn fail_delete(&self, name: impl Into<String>) {
        self.failing_deletes.write().await.insert(name.into());
    }

    async fn record(&self, call: PlatformCall) {
        if self.call_log {
            self.calls.write().await.push(call);
        }
    }
}

#[async_trait]
impl OrchestrationClient for InMemoryPlatform {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_containers(&self) -> PlatformResult<Vec<ContainerObservation>> {
        self.record(PlatformCall::List).await;
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(PlatformError::timeout("list containers"));
        }

        let hidden = self.hidden_from_list.read().await;
        let containers = self.containers.read().await;
        Ok(containers
            .values()
            .filter(|c| !hidden.contains(&c.name))
            .cloned()
            .collect())
    }

    async fn get_container(&self, name: &str) -> PlatformResult<Option<ContainerObservation>> {
        self.record(PlatformCall::Get(name.to_string())).await;
        if self.failing_gets.read().await.contains(name) {
            return Err(PlatformError::Transport(format!("connection reset fetching {name}")));
        }

        let containers = self.containers.read().await;
        Ok(containers.get(name).cloned())
    }

    async fn delete_container(&self, name: &str) -> PlatformResult<()> {
        self.record(PlatformCall::Delete(name.to_string())).await;
        if self.failing_deletes.read().await.contains(name) {
            return Err(PlatformError::Status {
                status: 500,
                message: format!("failed to delete {name}"),
            });
        }

        self.containers.write().await.remove(name);
        Ok(())
    }
}

/// A call received by [`InMemoryStateManager`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCall {
    ActiveStates,
    ActiveState(WorkflowInstance),
    ReceiveIgnoreClosed(Event),
}

/// An event accepted by [`InMemoryStateManager`] and what became of it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedEvent {
    pub event: Event,
    pub expected: ExpectedRevision,
    pub delivery: Delivery,
}

#[derive(Debug, Clone)]
enum DeferredChange {
    Close(WorkflowInstance),
    Activate(RunState),
}

/// In-memory workflow state manager
///
/// Holds only active instances; an instance absent from the map has a
/// closed stream. Unless created with
/// [`InMemoryStateManager::without_transitions`], a run error moves the
/// instance to [`RunPhase::Failed`].
#[derive(Debug)]
pub struct InMemoryStateManager {
    states: RwLock<BTreeMap<WorkflowInstance, RunState>>,
    received: RwLock<VecDeque<ReceivedEvent>>,
    event_history: usize,
    calls: RwLock<Vec<StateCall>>,
    call_log: bool,
    after_snapshot: RwLock<Vec<DeferredChange>>,
    apply_transitions: bool,
    fail_snapshots: AtomicBool,
    fail_single_lookups: AtomicBool,
}

impl Default for InMemoryStateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStateManager {
    /// Create a state manager that applies transitions
    pub fn new() -> Self {
        Self::with_transitions(true)
    }

    /// Create a state manager that keeps events without changing state
    pub fn without_transitions() -> Self {
        Self::with_transitions(false)
    }

    fn with_transitions(apply_transitions: bool) -> Self {
        Self {
            states: RwLock::new(BTreeMap::new()),
            received: RwLock::new(VecDeque::new()),
            event_history: DEFAULT_EVENT_HISTORY,
            calls: RwLock::new(Vec::new()),
            call_log: false,
            after_snapshot: RwLock::new(Vec::new()),
            apply_transitions,
            fail_snapshots: AtomicBool::new(false),
            fail_single_lookups: AtomicBool::new(false),
        }
    }

    /// Keep every call received from now on; see [`InMemoryStateManager::calls`]
    pub fn with_call_log(mut self) -> Self {
        self.call_log = true;
        self
    }

    /// Retain at most `capacity` accepted events, dropping the oldest
    pub fn with_event_history(mut self, capacity: usize) -> Self {
        self.event_history = capacity.max(1);
        self
    }

    /// Create or replace an active instance's state
    pub async fn upsert(&self, state: RunState) {
        let mut states = self.states.write().await;
        states.insert(state.instance.clone(), state);
    }

    /// Close an instance's stream, removing it from the active set
    pub async fn close(&self, instance: &WorkflowInstance) -> bool {
        let mut states = self.states.write().await;
        states.remove(instance).is_some()
    }

    pub async fn states(&self) -> Vec<RunState> {
        let states = self.states.read().await;
        states.values().cloned().collect()
    }

    /// Retained events, oldest first
    pub async fn received(&self) -> Vec<ReceivedEvent> {
        self.received.read().await.iter().cloned().collect()
    }

    /// Up to `limit` retained events, newest first
    pub async fn recent_events(&self, limit: usize) -> Vec<ReceivedEvent> {
        let received = self.received.read().await;
        received.iter().rev().take(limit).cloned().collect()
    }

    /// Every call received so far, in order; empty without a call log
    pub async fn calls(&self) -> Vec<StateCall> {
        self.calls.read().await.clone()
    }

    pub fn fail_snapshots(&self, fail: bool) {
        self.fail_snapshots.store(fail, Ordering::SeqCst);
    }

    pub fn fail_single_lookups(&self, fail: bool) {
        self.fail_single_lookups.store(fail, Ordering::SeqCst);
    }

    /// Close `instance` right after the next snapshot is served
    pub async fn close_after_snapshot(&self, instance: WorkflowInstance) {
        self.after_snapshot
            .write()
            .await
            .push(DeferredChange::Close(instance));
    }

    /// Activate `state` right after the next snapshot is served
    pub async fn activate_after_snapshot(&self, state: RunState) {
        self.after_snapshot
            .write()
            .await
            .push(DeferredChange::Activate(state));
    }

    async fn record(&self, call: StateCall) {
        if self.call_log {
            self.calls.write().await.push(call);
        }
    }

    async fn apply_deferred(&self) {
        let changes: Vec<_> = self.after_snapshot.write().await.drain(..).collect();
        for change in changes {
            match change {
                DeferredChange::Close(instance) => {
                    self.close(&instance).await;
                }
                DeferredChange::Activate(state) => self.upsert(state).await,
            }
        }
    }
}

#[async_trait]
impl StateManager for InMemoryStateManager {
    async fn active_states(&self) -> StateResult<ActiveStates> {
        self.record(StateCall::ActiveStates).await;
        if self.fail_snapshots.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("snapshot store offline".to_string()));
        }

        let snapshot: ActiveStates = {
            let states = self.states.read().await;
            states.values().cloned().collect()
        };
        self.apply_deferred().await;
        Ok(snapshot)
    }

    async fn active_state(&self, instance: &WorkflowInstance) -> StateResult<Option<RunState>> {
        self.record(StateCall::ActiveState(instance.clone())).await;
        if self.fail_single_lookups.load(Ordering::SeqCst) {
            return Err(StateError::Unavailable("state lookup timed out".to_string()));
        }

        let states = self.states.read().await;
        Ok(states.get(instance).cloned())
    }

    async fn receive_ignore_closed(
        &self,
        event: Event,
        expected: ExpectedRevision,
    ) -> StateResult<Delivery> {
        self.record(StateCall::ReceiveIgnoreClosed(event.clone()))
            .await;

        let delivery = {
            let mut states = self.states.write().await;
            match states.get_mut(event.instance()) {
                None => Delivery::DroppedClosed,
                Some(state) if state.phase.is_closed() => Delivery::DroppedClosed,
                Some(state) => {
                    if !expected.admits(state.counter) {
                        return Err(StateError::Rejected(format!(
                            "{} is at revision {}, expected {:?}",
                            event.instance(),
                            state.counter,
                            expected
                        )));
                    }
                    if self.apply_transitions {
                        let Event::RunError { message, .. } = &event;
                        state.phase = RunPhase::Failed;
                        state.data.message = Some(message.clone());
                        state.counter += 1;
                        state.updated_at = Utc::now();
                    }
                    Delivery::Applied
                }
            }
        };

        let mut received = self.received.write().await;
        if received.len() == self.event_history {
            received.pop_front();
        }
        received.push_back(ReceivedEvent {
            event,
            expected,
            delivery,
        });
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use podwatch_types::{StateData, WorkflowId};

    fn instance(parameter: &str) -> WorkflowInstance {
        WorkflowInstance::new(WorkflowId::new("comp", "wf").unwrap(), parameter).unwrap()
    }

    #[tokio::test]
    async fn test_run_error_fails_running_instance() {
        let states = InMemoryStateManager::new();
        states
            .upsert(RunState::new(
                instance("a"),
                RunPhase::Running,
                StateData::default().with_execution_id("eid-a"),
            ))
            .await;

        let delivery = states
            .receive_ignore_closed(
                Event::run_error(instance("a"), "gone"),
                ExpectedRevision::Any,
            )
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::Applied);

        let state = states.active_state(&instance("a")).await.unwrap().unwrap();
        assert_eq!(state.phase, RunPhase::Failed);
        assert_eq!(state.counter, 1);
        assert_eq!(state.data.message.as_deref(), Some("gone"));
    }

    #[tokio::test]
    async fn test_closed_instance_drops_event() {
        let states = InMemoryStateManager::new();
        let delivery = states
            .receive_ignore_closed(
                Event::run_error(instance("x"), "gone"),
                ExpectedRevision::Any,
            )
            .await
            .unwrap();
        assert_eq!(delivery, Delivery::DroppedClosed);
        assert_eq!(states.received().await[0].delivery, Delivery::DroppedClosed);
    }

    #[tokio::test]
    async fn test_revision_mismatch_rejected() {
        let states = InMemoryStateManager::new();
        states
            .upsert(RunState::new(instance("a"), RunPhase::Running, StateData::default()))
            .await;

        let result = states
            .receive_ignore_closed(
                Event::run_error(instance("a"), "gone"),
                ExpectedRevision::Exactly(5),
            )
            .await;
        assert!(matches!(result, Err(StateError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_platform_delete_is_idempotent() {
        let platform = InMemoryPlatform::new("default").with_call_log();
        platform.insert(ContainerObservation::new("eid1")).await;

        platform.delete_container("eid1").await.unwrap();
        platform.delete_container("eid1").await.unwrap();

        assert!(!platform.contains("eid1").await);
        assert_eq!(platform.deletes().await, vec!["eid1", "eid1"]);
    }

    #[tokio::test]
    async fn test_hidden_container_still_served_by_name() {
        let platform = InMemoryPlatform::new("default");
        platform.insert(ContainerObservation::new("eid1")).await;
        platform.hide_from_list("eid1").await;

        assert!(platform.list_containers().await.unwrap().is_empty());
        assert!(platform.get_container("eid1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_calls_are_kept_only_with_a_call_log() {
        let platform = InMemoryPlatform::new("default");
        let states = InMemoryStateManager::new();
        for _ in 0..10 {
            platform.list_containers().await.unwrap();
            states.active_states().await.unwrap();
        }
        assert!(platform.calls().await.is_empty());
        assert!(states.calls().await.is_empty());

        let states = InMemoryStateManager::new().with_call_log();
        states.active_states().await.unwrap();
        assert_eq!(states.calls().await, vec![StateCall::ActiveStates]);
    }

    #[tokio::test]
    async fn test_event_history_is_bounded() {
        let states = InMemoryStateManager::new().with_event_history(3);
        for parameter in ["a", "b", "c", "d", "e"] {
            states
                .receive_ignore_closed(
                    Event::run_error(instance(parameter), "gone"),
                    ExpectedRevision::Any,
                )
                .await
                .unwrap();
        }

        let retained: Vec<_> = states
            .received()
            .await
            .into_iter()
            .map(|received| received.event.instance().parameter().to_string())
            .collect();
        assert_eq!(retained, vec!["c", "d", "e"]);

        let recent = states.recent_events(2).await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event.instance(), &instance("e"));
        assert_eq!(recent[1].event.instance(), &instance("d"));
    }
}
