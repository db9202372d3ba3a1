//! Podwatch Types - Core types for pod reconciliation
//!
//! The workflow scheduler runs every workflow instance as a container (pod)
//! on an orchestration platform. These types describe both sides of that
//! relationship so the reconciler can join them.
//!
//! ## Key Concepts
//!
//! - **WorkflowInstance**: One scheduled execution of a workflow for a parameter
//! - **RunState**: The scheduler's per-instance state, read as a snapshot
//! - **ContainerObservation**: A platform container, normalized so no field is null
//! - **Ownership annotation**: The stable link from a container back to its instance
//! - **ContainerDescriptor**: What the scheduler asks the platform to run
//! - **Event**: Recovery requests sent back to the workflow state machine

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod container;
pub mod container_spec;
pub mod event;
pub mod ids;
pub mod naming;
pub mod state;

// Re-export main types
pub use container::{ContainerObservation, ContainerPhase, SubStatus};
pub use container_spec::{
    ContainerDescriptor, ProcessSpec, RestartPolicy, RunSpec, SecretMount, SecretSpec, SpecError,
    VolumeMount,
};
pub use event::{Delivery, Event, ExpectedRevision};
pub use ids::{IdentityError, WorkflowId, WorkflowInstance};
pub use naming::{owner_of, OWNERSHIP_ANNOTATION};
pub use state::{ActiveStates, RunPhase, RunState, StateData};
