//! Appliance Crate
//!
//! Firmware-style entry for the appliance on a hosted target:
//! - Demo UI, MATTER and MQTT services
//! - Project service registration from a command-line selection
//! - Boot sequence (bring-up, boot counter, startup pass)
//! - Status LED heartbeat
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use appliance::{boot, ApplianceServices, PROJECT_SERVICES};
//! use servicecore::HostPlatform;
//! use servicemanagement::{ManagerConfig, ServiceRegistration};
//!
//! static REGISTRATION: ServiceRegistration = ServiceRegistration::new();
//!
//! let platform = Arc::new(HostPlatform::new("./data"));
//! let appliance = boot(
//!     platform,
//!     &REGISTRATION,
//!     ApplianceServices::new(PROJECT_SERVICES.to_vec()),
//!     ManagerConfig::default(),
//! );
//! appliance.startup?;
//! ```

pub mod boot;
pub mod config;
pub mod heartbeat;
pub mod registration;
pub mod services;

// Re-exports
pub use boot::{boot, Appliance, MemoryUsage, BOOT_COUNT_KEY};
pub use config::load_manager_config;
pub use heartbeat::{Heartbeat, HEARTBEAT_PATTERN};
pub use registration::{
    parse_selection, register_appliance_services, ApplianceServices, PROJECT_SERVICES,
};
pub use services::{LoopGroup, LoopState, MatterService, MqttService, UiService};
