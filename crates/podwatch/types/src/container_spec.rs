//! Container descriptors for workflow instances
//!
//! [`ContainerDescriptor::build`] is the only place that decides how a
//! launched container is named and annotated. The reconciler relies on the
//! same naming and annotation to recognize containers it owns, so both go
//! through [`crate::naming`].

use crate::ids::WorkflowInstance;
use crate::naming::{self, OWNERSHIP_ANNOTATION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

pub const ENV_COMPONENT_ID: &str = "PODWATCH_COMPONENT_ID";
pub const ENV_WORKFLOW_ID: &str = "PODWATCH_WORKFLOW_ID";
pub const ENV_PARAMETER: &str = "PODWATCH_PARAMETER";
pub const ENV_EXECUTION_ID: &str = "PODWATCH_EXECUTION_ID";
pub const ENV_TRIGGER_ID: &str = "PODWATCH_TRIGGER_ID";
pub const ENV_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";

pub const SERVICE_ACCOUNT_VOLUME: &str = "service-account-key";
pub const SERVICE_ACCOUNT_MOUNT_PATH: &str = "/etc/podwatch-wf-sa-keys/";
pub const SERVICE_ACCOUNT_KEY_FILE: &str = "service-account.json";

/// Errors raised while building a [`ContainerDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("Execution id must not be empty")]
    EmptyExecutionId,

    #[error("Secret volume name {0:?} is reserved for the service account key")]
    ReservedVolumeName(String),
}

/// What to run for one execution of a workflow instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Caller-assigned, unique per launch; becomes the container name
    pub execution_id: String,
    pub image: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_id: Option<String>,
}

impl RunSpec {
    pub fn simple(execution_id: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            image: image.into(),
            args: Vec::new(),
            trigger_id: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trigger_id(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }
}

/// A user-provided secret mounted into the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMount {
    pub name: String,
    pub mount_path: String,
}

/// Secrets provisioned for a launch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_secret: Option<SecretMount>,
    /// Name of a platform secret holding a service account key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RestartPolicy {
    #[default]
    Never,
}

/// A secret volume mounted read-only into the process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub volume_name: String,
    pub secret_name: String,
    pub mount_path: String,
}

/// The single process run inside a workflow container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    pub image: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Container the scheduler asks the platform to run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    pub process: ProcessSpec,
    pub restart_policy: RestartPolicy,
    pub volumes: Vec<VolumeMount>,
}

impl ContainerDescriptor {
    /// Build the descriptor for one launch of `instance`
    pub fn build(
        instance: &WorkflowInstance,
        run_spec: &RunSpec,
        secrets: &SecretSpec,
    ) -> Result<Self, SpecError> {
        if run_spec.execution_id.is_empty() {
            return Err(SpecError::EmptyExecutionId);
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(
            OWNERSHIP_ANNOTATION.to_string(),
            naming::ownership_value(instance),
        );

        let mut env = BTreeMap::new();
        env.insert(
            ENV_COMPONENT_ID.to_string(),
            instance.workflow_id().component_id().to_string(),
        );
        env.insert(
            ENV_WORKFLOW_ID.to_string(),
            instance.workflow_id().id().to_string(),
        );
        env.insert(ENV_PARAMETER.to_string(), instance.parameter().to_string());
        env.insert(ENV_EXECUTION_ID.to_string(), run_spec.execution_id.clone());
        if let Some(trigger_id) = &run_spec.trigger_id {
            env.insert(ENV_TRIGGER_ID.to_string(), trigger_id.clone());
        }

        let mut volumes = Vec::new();
        if let Some(secret) = &secrets.custom_secret {
            if secret.name == SERVICE_ACCOUNT_VOLUME {
                return Err(SpecError::ReservedVolumeName(secret.name.clone()));
            }
            volumes.push(VolumeMount {
                volume_name: secret.name.clone(),
                secret_name: secret.name.clone(),
                mount_path: secret.mount_path.clone(),
            });
        }
        if let Some(secret_name) = &secrets.service_account_secret {
            volumes.push(VolumeMount {
                volume_name: SERVICE_ACCOUNT_VOLUME.to_string(),
                secret_name: secret_name.clone(),
                mount_path: SERVICE_ACCOUNT_MOUNT_PATH.to_string(),
            });
            env.insert(
                ENV_APPLICATION_CREDENTIALS.to_string(),
                format!("{}{}", SERVICE_ACCOUNT_MOUNT_PATH, SERVICE_ACCOUNT_KEY_FILE),
            );
        }

        Ok(Self {
            name: run_spec.execution_id.clone(),
            annotations,
            process: ProcessSpec {
                name: run_spec.execution_id.clone(),
                image: run_spec.image.clone(),
                args: run_spec.args.clone(),
                env,
            },
            restart_policy: RestartPolicy::Never,
            volumes,
        })
    }

    /// Owning instance, decoded from the ownership annotation
    pub fn owner(&self) -> Option<WorkflowInstance> {
        naming::owner_of(&self.annotations)
    }

    /// Render as a Kubernetes `Pod` manifest
    pub fn to_pod_manifest(&self) -> serde_json::Value {
        let env: Vec<_> = self
            .process
            .env
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        let volume_mounts: Vec<_> = self
            .volumes
            .iter()
            .map(|v| json!({ "name": v.volume_name, "mountPath": v.mount_path, "readOnly": true }))
            .collect();
        let volumes: Vec<_> = self
            .volumes
            .iter()
            .map(|v| json!({ "name": v.volume_name, "secret": { "secretName": v.secret_name } }))
            .collect();

        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": self.name,
                "annotations": self.annotations,
            },
            "spec": {
                "restartPolicy": "Never",
                "containers": [{
                    "name": self.process.name,
                    "image": self.process.image,
                    "args": self.process.args,
                    "env": env,
                    "volumeMounts": volume_mounts,
                }],
                "volumes": volumes,
            }
        })
    }
}
