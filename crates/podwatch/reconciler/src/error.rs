//! Error types for the reconciler and its collaborators

use thiserror::Error;

/// Failures talking to the orchestration platform
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Platform returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode platform response: {0}")]
    Decode(String),

    #[error("Invalid container name: {0:?}")]
    InvalidName(String),
}

impl PlatformError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }
}

/// Failures talking to the workflow state manager
#[derive(Debug, Clone, Error)]
pub enum StateError {
    #[error("State manager unavailable: {0}")]
    Unavailable(String),

    #[error("Event rejected: {0}")]
    Rejected(String),
}

/// Reasons a reconciliation pass was abandoned
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Result type for platform operations
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Result type for state manager operations
pub type StateResult<T> = std::result::Result<T, StateError>;

/// Result type for reconciliation passes
pub type Result<T> = std::result::Result<T, ReconcileError>;
