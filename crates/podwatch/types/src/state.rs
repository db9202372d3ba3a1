//! Run state of workflow instances
//!
//! The workflow state machine owns these values. Everything outside it,
//! including the reconciler, sees them only through [`ActiveStates`]
//! snapshots and requests changes by sending events.

use crate::ids::WorkflowInstance;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lifecycle phase of a workflow instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    New,
    Queued,
    Prepare,
    Submitting,
    Submitted,
    Running,
    Terminated,
    Failed,
    AwaitingRetry,
    Done,
    Error,
}

impl RunPhase {
    /// Whether the state stream for this phase accepts no further events
    pub fn is_closed(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Error)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::New => "NEW",
            RunPhase::Queued => "QUEUED",
            RunPhase::Prepare => "PREPARE",
            RunPhase::Submitting => "SUBMITTING",
            RunPhase::Submitted => "SUBMITTED",
            RunPhase::Running => "RUNNING",
            RunPhase::Terminated => "TERMINATED",
            RunPhase::Failed => "FAILED",
            RunPhase::AwaitingRetry => "AWAITING_RETRY",
            RunPhase::Done => "DONE",
            RunPhase::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Attributes carried alongside a run phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    /// Name the instance's container was launched under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,

    #[serde(default)]
    pub tries: u32,

    /// Last message recorded by the state machine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StateData {
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    pub fn with_trigger_id(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }
}

/// State of a single workflow instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub instance: WorkflowInstance,
    pub phase: RunPhase,
    #[serde(default)]
    pub data: StateData,
    /// Revision of the instance's state stream
    #[serde(default)]
    pub counter: u64,
    #[serde(default = "chrono::Utc::now")]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl RunState {
    pub fn new(instance: WorkflowInstance, phase: RunPhase, data: StateData) -> Self {
        Self {
            instance,
            phase,
            data,
            counter: 0,
            updated_at: chrono::Utc::now(),
        }
    }

    /// The container name of the current execution; an empty id counts as none
    pub fn execution_id(&self) -> Option<&str> {
        self.data
            .execution_id
            .as_deref()
            .filter(|execution_id| !execution_id.is_empty())
    }

    pub fn is_running(&self) -> bool {
        self.phase == RunPhase::Running
    }
}

/// Point-in-time view of every instance the scheduler considers active
///
/// Returned by value; later transitions in the state machine do not show
/// through an existing snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveStates {
    states: BTreeMap<WorkflowInstance, RunState>,
}

impl ActiveStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, instance: &WorkflowInstance) -> Option<&RunState> {
        self.states.get(instance)
    }

    pub fn contains(&self, instance: &WorkflowInstance) -> bool {
        self.states.contains_key(instance)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&WorkflowInstance, &RunState)> {
        self.states.iter()
    }

    /// States whose phase is [`RunPhase::Running`]
    pub fn running(&self) -> impl Iterator<Item = &RunState> {
        self.states.values().filter(|state| state.is_running())
    }

    pub fn into_states(self) -> Vec<RunState> {
        self.states.into_values().collect()
    }
}

impl FromIterator<RunState> for ActiveStates {
    fn from_iter<I: IntoIterator<Item = RunState>>(iter: I) -> Self {
        Self {
            states: iter
                .into_iter()
                .map(|state| (state.instance.clone(), state))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WorkflowId;

    fn instance(parameter: &str) -> WorkflowInstance {
        WorkflowInstance::new(WorkflowId::new("comp", "wf").unwrap(), parameter).unwrap()
    }

    #[test]
    fn test_running_filter() {
        let states: ActiveStates = vec![
            RunState::new(
                instance("a"),
                RunPhase::Running,
                StateData::default().with_execution_id("eid-a"),
            ),
            RunState::new(instance("b"), RunPhase::Submitted, StateData::default()),
        ]
        .into_iter()
        .collect();

        let running: Vec<_> = states.running().collect();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].execution_id(), Some("eid-a"));
        assert!(states.contains(&instance("b")));
    }

    #[test]
    fn test_closed_phases() {
        assert!(RunPhase::Done.is_closed());
        assert!(RunPhase::Error.is_closed());
        assert!(!RunPhase::Failed.is_closed());
        assert!(!RunPhase::Running.is_closed());
    }

    #[test]
    fn test_phase_serialization() {
        let json = serde_json::to_string(&RunPhase::AwaitingRetry).unwrap();
        assert_eq!(json, "\"AWAITING_RETRY\"");
        assert_eq!(RunPhase::AwaitingRetry.to_string(), "AWAITING_RETRY");
    }
}
