//! Events sent to the workflow state machine

use crate::ids::WorkflowInstance;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transition request for a workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The instance's run failed outside its own control
    RunError {
        instance: WorkflowInstance,
        message: String,
    },
}

impl Event {
    pub fn run_error(instance: WorkflowInstance, message: impl Into<String>) -> Self {
        Event::RunError {
            instance,
            message: message.into(),
        }
    }

    pub fn instance(&self) -> &WorkflowInstance {
        match self {
            Event::RunError { instance, .. } => instance,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::RunError { instance, message } => {
                write!(f, "runError({}, {:?})", instance, message)
            }
        }
    }
}

/// Revision an event expects the instance's state stream to be at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedRevision {
    /// Apply against whatever revision is current
    Any,
    /// Apply only if the stream is at exactly this revision
    Exactly(u64),
}

impl ExpectedRevision {
    pub fn admits(self, current: u64) -> bool {
        match self {
            ExpectedRevision::Any => true,
            ExpectedRevision::Exactly(expected) => expected == current,
        }
    }
}

/// How the state machine disposed of an event sent with ignore-closed semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delivery {
    Applied,
    /// The instance's stream was already closed; the event was dropped
    DroppedClosed,
}

impl Delivery {
    pub fn as_str(self) -> &'static str {
        match self {
            Delivery::Applied => "applied",
            Delivery::DroppedClosed => "dropped_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WorkflowId;

    #[test]
    fn test_run_error_display() {
        let instance = WorkflowInstance::new(WorkflowId::new("c", "w").unwrap(), "p").unwrap();
        let event = Event::run_error(instance.clone(), "boom");
        assert_eq!(event.instance(), &instance);
        assert_eq!(event.to_string(), "runError(c#w#p, \"boom\")");
    }

    #[test]
    fn test_expected_revision() {
        assert!(ExpectedRevision::Any.admits(17));
        assert!(ExpectedRevision::Exactly(3).admits(3));
        assert!(!ExpectedRevision::Exactly(3).admits(4));
    }
}
