//! Service Traits
//!
//! Defines the contract every concrete service implements and the errors the
//! lifecycle layer reports.

use std::sync::Arc;

use thiserror::Error;

use crate::identity::ServiceIdentity;
use crate::task::{TaskHandle, TaskPriority};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid service identity: {0}")]
    InvalidIdentity(ServiceIdentity),
    #[error("Service not registered: {0}")]
    NotRegistered(ServiceIdentity),
    #[error("Service creation failed: {0}")]
    CreateFailed(ServiceIdentity),
    #[error("Task '{name}' could not be created: {reason}")]
    TaskSpawn { name: String, reason: String },
    #[error("Task '{0}' panicked")]
    TaskPanicked(String),
    #[error("Service {identity} failed to start: {reason}")]
    StartFailed {
        identity: ServiceIdentity,
        reason: String,
    },
    #[error("Service manager unavailable: {0}")]
    ManagerUnavailable(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Shared-ownership handle to a constructed service.
pub type SharedService = Arc<dyn Service>;

/// Service Trait
///
/// A service is constructed with its execution-context name and identity and
/// later asked to start its own task. The lifecycle manager only ever talks to
/// services through this trait.
pub trait Service: Send + Sync {
    /// Execution-context name given at construction
    fn name(&self) -> &str;

    /// Identity given at construction
    fn identity(&self) -> ServiceIdentity;

    /// Start the service task with the given priority and stack budget.
    ///
    /// On success the returned handle belongs to the caller.
    fn task_init(&self, priority: TaskPriority, stack_bytes: usize) -> ServiceResult<TaskHandle>;
}
