//! Container manifest rendering

use crate::error::ApiResult;
use axum::{extract::rejection::JsonRejection, Json};
use podwatch_types::{ContainerDescriptor, RunSpec, SecretSpec, WorkflowInstance};
use serde::Deserialize;

/// Manifest request
#[derive(Debug, Deserialize)]
pub struct RenderManifestRequest {
    pub instance: WorkflowInstance,
    pub run_spec: RunSpec,
    #[serde(default)]
    pub secrets: SecretSpec,
}

/// Render the pod manifest a launch of `instance` would submit.
///
/// Nothing is sent to the platform.
pub async fn render_manifest(
    payload: Result<Json<RenderManifestRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(request) = payload?;
    let descriptor =
        ContainerDescriptor::build(&request.instance, &request.run_spec, &request.secrets)?;
    Ok(Json(descriptor.to_pod_manifest()))
}
