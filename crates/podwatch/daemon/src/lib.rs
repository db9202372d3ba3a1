//! Podwatch Daemon library
//!
//! This module provides the core components for the podwatch daemon:
//! - Kubernetes REST facade
//! - Periodic reconciliation scheduler
//! - Admin REST API
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod kube;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use kube::KubeRestClient;
pub use scheduler::Scheduler;
pub use server::Server;
