//! Orchestration platform facade
//!
//! Implementations are bound to one namespace and own the timeout of every
//! call they make. All results are normalized [`ContainerObservation`]s.

use crate::error::PlatformResult;
use async_trait::async_trait;
use podwatch_types::ContainerObservation;

/// Access to the containers of one platform namespace
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Namespace this client operates in
    fn namespace(&self) -> &str;

    /// List every container in the namespace.
    ///
    /// The listing may be stale or incomplete; callers must not infer
    /// absence of a specific container from it.
    async fn list_containers(&self) -> PlatformResult<Vec<ContainerObservation>>;

    /// Fetch a single container by name, `None` if it does not exist
    async fn get_container(&self, name: &str) -> PlatformResult<Option<ContainerObservation>>;

    /// Request deletion of a container.
    ///
    /// Deleting a container that is already gone succeeds.
    async fn delete_container(&self, name: &str) -> PlatformResult<()>;
}
