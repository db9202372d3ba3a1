//! Podwatch Reconciler - Keeps run state and platform containers consistent
//!
//! The reconciler runs periodically against one platform namespace. Each
//! cycle reads a snapshot of active workflow instances, reports running
//! instances whose container has disappeared, and deletes finished
//! containers whose instance is no longer active.
//!
//! ## Collaborators
//!
//! - [`OrchestrationClient`]: lists, fetches and deletes containers
//! - [`StateManager`]: serves active-state snapshots and accepts events
//! - [`DebugOverride`]: suppresses deletions while set
//!
//! In-memory implementations of both traits live in [`memory`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod debug;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod reconciler;
pub mod report;
pub mod state;

pub use client::OrchestrationClient;
pub use debug::DebugOverride;
pub use error::{PlatformError, PlatformResult, ReconcileError, Result, StateError, StateResult};
pub use memory::{
    InMemoryPlatform, InMemoryStateManager, PlatformCall, ReceivedEvent, StateCall,
    DEFAULT_EVENT_HISTORY,
};
pub use metrics::ReconcilerMetrics;
pub use reconciler::{Reconciler, ReconcilerConfig, MISSING_CONTAINER_MESSAGE};
pub use report::{CycleReport, MissingContainerReport, OrphanReport, SkipReason};
pub use state::StateManager;
