//! Service Management Crate
//!
//! Provides service lifecycle management with:
//! - Factory registry mapping service identities to constructors
//! - Idempotent project service registration
//! - Lifecycle manager that brings the platform up and starts services
//! - Startup reports describing what each pass did
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use servicecore::{HostPlatform, ServiceIdentity};
//! use servicemanagement::{ManagerConfig, ServiceFactoryRegistry, ServiceLifecycleManager};
//!
//! let registry = Arc::new(ServiceFactoryRegistry::new());
//! registry.register(ServiceIdentity::UI, |name, id| Some(Arc::new(UiService::new(name, id)) as _));
//!
//! let platform = HostPlatform::new("/var/lib/appliance");
//! let manager = ServiceLifecycleManager::new(registry, &platform, ManagerConfig::default());
//!
//! // Start all registered services from the manager's task
//! manager.request_startup()?;
//! println!("{}", serde_json::to_string_pretty(&manager.status())?);
//! ```

mod dispatcher;
pub mod manager;
pub mod registration;
pub mod registry;
pub mod report;

// Re-exports
pub use manager::{
    ManagerConfig, ManagerStatus, ServiceLifecycleManager, ServiceStatusEntry, StartupDelay,
};
pub use registration::ServiceRegistration;
pub use registry::{ServiceFactory, ServiceFactoryRegistry};
pub use report::{ServiceState, StartupEntry, StartupOutcome, StartupReport};
