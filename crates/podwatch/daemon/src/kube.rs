//! Kubernetes REST facade
//!
//! Talks to the core `v1` pods API of one namespace. Responses are decoded
//! into lenient structs whose every field is optional and then normalized
//! into [`ContainerObservation`]s.

use crate::config::{PlatformBackend, PlatformConfig};
use crate::error::{DaemonError, DaemonResult};
use async_trait::async_trait;
use podwatch_reconciler::{OrchestrationClient, PlatformError, PlatformResult};
use podwatch_types::{ContainerObservation, ContainerPhase, SubStatus};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Orchestration client backed by the Kubernetes API server
pub struct KubeRestClient {
    client: Client,
    base_url: Url,
    namespace: String,
    bearer_token: Option<String>,
}

impl KubeRestClient {
    /// Create a client for the Kubernetes backend in `config`
    pub fn from_config(config: &PlatformConfig) -> DaemonResult<Self> {
        let PlatformBackend::Kubernetes {
            api_server,
            bearer_token_file,
        } = &config.backend
        else {
            return Err(DaemonError::Config(
                "platform backend is not kubernetes".to_string(),
            ));
        };

        let bearer_token = match bearer_token_file {
            Some(path) => Some(std::fs::read_to_string(path)?.trim().to_string()),
            None => None,
        };

        let base_url = Url::parse(api_server)
            .map_err(|e| DaemonError::Config(format!("Invalid API server {api_server:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DaemonError::Config(format!(
                "Invalid API server {api_server:?}: not a base URL"
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DaemonError::Platform(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            namespace: config.namespace.clone(),
            bearer_token,
        })
    }

    fn pods_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "namespaces", self.namespace.as_str(), "pods"]);
        }
        url
    }

    /// URL of one pod; `name` is escaped as a single path segment
    fn pod_url(&self, name: &str) -> PlatformResult<Url> {
        if name.is_empty() {
            return Err(PlatformError::InvalidName(name.to_string()));
        }
        let mut url = self.pods_url();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(name);
        }
        Ok(url)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        operation: &str,
    ) -> PlatformResult<reqwest::Response> {
        let request = match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .await
            .map_err(|e| transport_error(e, operation))
    }
}

#[async_trait]
impl OrchestrationClient for KubeRestClient {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list_containers(&self) -> PlatformResult<Vec<ContainerObservation>> {
        let response = self
            .send(self.client.get(self.pods_url()), "list pods")
            .await?;
        let response = error_for_status(response).await?;
        let list: PodList = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;

        Ok(list
            .items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pod| {
                let observation = pod.into_observation();
                if observation.is_none() {
                    tracing::warn!("Ignoring pod without a name");
                }
                observation
            })
            .collect())
    }

    async fn get_container(&self, name: &str) -> PlatformResult<Option<ContainerObservation>> {
        let response = self
            .send(self.client.get(self.pod_url(name)?), "get pod")
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = error_for_status(response).await?;
        let pod: Pod = response
            .json()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;

        Ok(Some(pod.into_observation_named(name)))
    }

    async fn delete_container(&self, name: &str) -> PlatformResult<()> {
        let response = self
            .send(self.client.delete(self.pod_url(name)?), "delete pod")
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(container = %name, "Pod already gone");
            return Ok(());
        }
        error_for_status(response).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error, operation: &str) -> PlatformError {
    if err.is_timeout() {
        PlatformError::timeout(operation)
    } else {
        PlatformError::Transport(err.to_string())
    }
}

async fn error_for_status(response: reqwest::Response) -> PlatformResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(PlatformError::Status {
        status: status.as_u16(),
        message,
    })
}

#[derive(Debug, Default, Deserialize)]
struct PodList {
    items: Option<Vec<Pod>>,
}

#[derive(Debug, Default, Deserialize)]
struct Pod {
    metadata: Option<ObjectMeta>,
    status: Option<PodStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    name: Option<String>,
    annotations: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    phase: Option<String>,
    container_statuses: Option<Vec<ContainerStatus>>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerStatus {
    name: Option<String>,
    state: Option<ContainerState>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    terminated: Option<serde_json::Value>,
}

impl Pod {
    fn into_observation(self) -> Option<ContainerObservation> {
        let name = self.metadata.as_ref()?.name.clone()?;
        Some(self.into_observation_named(&name))
    }

    /// Normalize, falling back to `name` when the pod carries none
    fn into_observation_named(self, name: &str) -> ContainerObservation {
        let metadata = self.metadata.unwrap_or_default();
        let status = self.status.unwrap_or_default();

        let sub_statuses = status
            .container_statuses
            .unwrap_or_default()
            .into_iter()
            .map(|cs| SubStatus {
                name: cs.name.unwrap_or_default(),
                terminated: cs
                    .state
                    .and_then(|state| state.terminated)
                    .is_some_and(|terminated| !terminated.is_null()),
            })
            .collect();

        ContainerObservation {
            name: metadata.name.unwrap_or_else(|| name.to_string()),
            annotations: metadata.annotations.unwrap_or_default(),
            phase: ContainerPhase::from_platform(status.phase.as_deref()),
            sub_statuses,
        }
    }
}
