//! Observed platform containers
//!
//! Platform clients normalize whatever the platform returns into a
//! [`ContainerObservation`] before the reconciler sees it: missing phase
//! becomes [`ContainerPhase::Unknown`], missing process statuses become an
//! empty list, and a process counts as terminated only when the platform
//! says so explicitly.

use crate::ids::WorkflowInstance;
use crate::naming::{self, OWNERSHIP_ANNOTATION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Platform-reported phase of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl ContainerPhase {
    /// Parse a platform phase string; anything unrecognized is `Unknown`
    pub fn from_platform(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => ContainerPhase::Pending,
            Some("Running") => ContainerPhase::Running,
            Some("Succeeded") => ContainerPhase::Succeeded,
            Some("Failed") => ContainerPhase::Failed,
            _ => ContainerPhase::Unknown,
        }
    }
}

impl fmt::Display for ContainerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Status of one process inside a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubStatus {
    pub name: String,
    pub terminated: bool,
}

impl SubStatus {
    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminated: false,
        }
    }

    pub fn terminated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminated: true,
        }
    }
}

/// A container as observed on the orchestration platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerObservation {
    pub name: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub phase: ContainerPhase,
    #[serde(default)]
    pub sub_statuses: Vec<SubStatus>,
}

impl ContainerObservation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
            phase: ContainerPhase::Unknown,
            sub_statuses: Vec::new(),
        }
    }

    /// Tag the container as owned by `instance`
    pub fn owned_by(mut self, instance: &WorkflowInstance) -> Self {
        self.annotations.insert(
            OWNERSHIP_ANNOTATION.to_string(),
            naming::ownership_value(instance),
        );
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_phase(mut self, phase: ContainerPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_sub_status(mut self, status: SubStatus) -> Self {
        self.sub_statuses.push(status);
        self
    }

    /// Owning workflow instance, if the container carries a valid annotation
    pub fn owner(&self) -> Option<WorkflowInstance> {
        naming::owner_of(&self.annotations)
    }

    /// True when every process has terminated.
    ///
    /// A container with no process statuses yet (still being scheduled) is
    /// not considered terminated.
    pub fn all_terminated(&self) -> bool {
        !self.sub_statuses.is_empty() && self.sub_statuses.iter().all(|s| s.terminated)
    }
}
