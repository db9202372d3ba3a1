//! Workflow identity
//!
//! A workflow is identified by the component that owns it plus its id within
//! that component. An instance adds the trigger parameter. Both have a
//! compact `#`-separated key form used wherever identity crosses a process
//! boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KEY_SEPARATOR: char = '#';

/// Errors raised while building or decoding identities
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Malformed workflow key: {0:?}")]
    MalformedWorkflowKey(String),

    #[error("Malformed workflow instance key: {0:?}")]
    MalformedInstanceKey(String),

    #[error("Invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

fn check_field(
    field: &'static str,
    value: &str,
    allow_empty: bool,
) -> Result<(), IdentityError> {
    let reason = if value.is_empty() && !allow_empty {
        "must not be empty"
    } else if value.contains(KEY_SEPARATOR) {
        "must not contain '#'"
    } else {
        return Ok(());
    };
    Err(IdentityError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    })
}

/// Identifier of a workflow within a component
///
/// The component id may not contain `#`; the workflow id may.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawWorkflowId")]
pub struct WorkflowId {
    component_id: String,
    id: String,
}

#[derive(Deserialize)]
struct RawWorkflowId {
    component_id: String,
    id: String,
}

impl TryFrom<RawWorkflowId> for WorkflowId {
    type Error = IdentityError;

    fn try_from(raw: RawWorkflowId) -> Result<Self, Self::Error> {
        Self::new(raw.component_id, raw.id)
    }
}

impl WorkflowId {
    /// Create a workflow id, rejecting values that would not survive
    /// [`WorkflowId::to_key`]
    pub fn new(
        component_id: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let component_id = component_id.into();
        let id = id.into();
        check_field("component id", &component_id, false)?;
        if id.is_empty() {
            return Err(IdentityError::InvalidField {
                field: "workflow id",
                value: id,
                reason: "must not be empty",
            });
        }
        Ok(Self { component_id, id })
    }

    pub fn component_id(&self) -> &str {
        &self.component_id
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Encode as `<component>#<id>`
    pub fn to_key(&self) -> String {
        format!("{}{}{}", self.component_id, KEY_SEPARATOR, self.id)
    }

    /// Decode a key produced by [`WorkflowId::to_key`].
    ///
    /// The component ends at the first separator; everything after it is the
    /// workflow id, which may itself contain separators.
    pub fn parse_key(key: &str) -> Result<Self, IdentityError> {
        match key.split_once(KEY_SEPARATOR) {
            Some((component_id, id)) => Self::new(component_id, id)
                .map_err(|_| IdentityError::MalformedWorkflowKey(key.to_string())),
            None => Err(IdentityError::MalformedWorkflowKey(key.to_string())),
        }
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// One execution of a workflow for a specific trigger parameter
///
/// The parameter may be empty but may not contain `#`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawWorkflowInstance")]
pub struct WorkflowInstance {
    workflow_id: WorkflowId,
    parameter: String,
}

#[derive(Deserialize)]
struct RawWorkflowInstance {
    workflow_id: WorkflowId,
    parameter: String,
}

impl TryFrom<RawWorkflowInstance> for WorkflowInstance {
    type Error = IdentityError;

    fn try_from(raw: RawWorkflowInstance) -> Result<Self, Self::Error> {
        Self::new(raw.workflow_id, raw.parameter)
    }
}

impl WorkflowInstance {
    pub fn new(
        workflow_id: WorkflowId,
        parameter: impl Into<String>,
    ) -> Result<Self, IdentityError> {
        let parameter = parameter.into();
        check_field("parameter", &parameter, true)?;
        Ok(Self {
            workflow_id,
            parameter,
        })
    }

    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Encode as `<component>#<id>#<parameter>`
    pub fn to_key(&self) -> String {
        format!(
            "{}{}{}",
            self.workflow_id.to_key(),
            KEY_SEPARATOR,
            self.parameter
        )
    }

    /// Decode a key produced by [`WorkflowInstance::to_key`].
    ///
    /// The parameter starts after the last separator.
    pub fn parse_key(key: &str) -> Result<Self, IdentityError> {
        let (workflow_key, parameter) = key
            .rsplit_once(KEY_SEPARATOR)
            .ok_or_else(|| IdentityError::MalformedInstanceKey(key.to_string()))?;

        let workflow_id = WorkflowId::parse_key(workflow_key)
            .map_err(|_| IdentityError::MalformedInstanceKey(key.to_string()))?;

        Self::new(workflow_id, parameter)
    }
}

impl fmt::Display for WorkflowInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

impl FromStr for WorkflowInstance {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_key(s)
    }
}
