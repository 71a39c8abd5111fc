//! Service Core Crate
//!
//! Shared contract between the lifecycle manager and concrete services:
//! - Service identities with their static name and stack tables
//! - The `Service` trait and lifecycle errors
//! - Task creation with a priority and stack budget
//! - Platform bring-up collaborators (storage, filesystem, shared bus)
//!
//! # Example
//!
//! ```rust,ignore
//! use servicecore::{spawn_task, Service, ServiceIdentity, TaskPriority};
//!
//! let handle = spawn_task(
//!     ServiceIdentity::UI.name(),
//!     TaskPriority::SERVICE,
//!     ServiceIdentity::UI.stack_size(),
//!     || { /* task body */ },
//! )?;
//! ```

pub mod identity;
pub mod platform;
pub mod task;
pub mod traits;

// Re-exports
pub use identity::{ServiceIdentity, IDENTITY_SLOTS, SERVICE_NAMES, SERVICE_STACK_SIZES};
pub use platform::{
    BusMessage, HostPlatform, NvsStore, PlatformBringUp, PlatformError, PlatformResult, SharedBus,
};
pub use task::{spawn_task, TaskHandle, TaskInfo, TaskPriority};
pub use traits::{Service, ServiceError, ServiceResult, SharedService};
