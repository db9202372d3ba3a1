//! Workflow state manager interface

use crate::error::StateResult;
use async_trait::async_trait;
use podwatch_types::{ActiveStates, Delivery, Event, ExpectedRevision, RunState, WorkflowInstance};

/// The scheduler's state machine, as seen by the reconciler
///
/// The state manager is the only writer of run state. The reconciler reads
/// snapshots and asks for transitions by sending events.
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Snapshot of every active instance
    async fn active_states(&self) -> StateResult<ActiveStates>;

    /// Current state of one instance, `None` if it is not active
    async fn active_state(&self, instance: &WorkflowInstance) -> StateResult<Option<RunState>>;

    /// Apply an event, dropping it if the instance's stream is already closed
    async fn receive_ignore_closed(
        &self,
        event: Event,
        expected: ExpectedRevision,
    ) -> StateResult<Delivery>;
}
