//! Container naming and the ownership annotation
//!
//! A container launched for an instance is named by the instance's
//! execution id and tagged with [`OWNERSHIP_ANNOTATION`], whose value is the
//! instance key. The annotation key and value format are persisted on live
//! containers and must stay readable across upgrades.

use crate::ids::{IdentityError, WorkflowInstance};
use std::collections::BTreeMap;

/// Annotation linking a container back to the workflow instance that owns it
pub const OWNERSHIP_ANNOTATION: &str = "podwatch-workflow-instance";

/// Annotation value for an owning instance
pub fn ownership_value(instance: &WorkflowInstance) -> String {
    instance.to_key()
}

/// Decode an ownership annotation value
pub fn parse_ownership(value: &str) -> Result<WorkflowInstance, IdentityError> {
    WorkflowInstance::parse_key(value)
}

/// Resolve the owning instance from a container's annotations.
///
/// Returns `None` when the annotation is absent or cannot be decoded; both
/// mean the container is not ours.
pub fn owner_of(annotations: &BTreeMap<String, String>) -> Option<WorkflowInstance> {
    annotations
        .get(OWNERSHIP_ANNOTATION)
        .and_then(|value| parse_ownership(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::WorkflowId;

    #[test]
    fn test_owner_of_annotated() {
        let instance =
            WorkflowInstance::new(WorkflowId::new("comp", "wf").unwrap(), "p1").unwrap();
        let mut annotations = BTreeMap::new();
        annotations.insert(OWNERSHIP_ANNOTATION.to_string(), ownership_value(&instance));

        assert_eq!(owner_of(&annotations), Some(instance));
    }

    #[test]
    fn test_owner_of_missing_or_garbage() {
        let mut annotations = BTreeMap::new();
        assert_eq!(owner_of(&annotations), None);

        annotations.insert(OWNERSHIP_ANNOTATION.to_string(), "garbage".to_string());
        assert_eq!(owner_of(&annotations), None);
    }

    #[test]
    fn test_persisted_format_is_stable() {
        // Containers created by earlier releases carry exactly this value.
        let parsed = parse_ownership("team-a#nightly#2017-01-01T00").unwrap();
        assert_eq!(parsed.workflow_id().component_id(), "team-a");
        assert_eq!(parsed.workflow_id().id(), "nightly");
        assert_eq!(parsed.parameter(), "2017-01-01T00");
    }
}
