//! Project service registration
//!
//! One explicit call registers every service a project ships. The routine
//! remembers that it ran, so calling it again leaves the registry untouched.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::registry::ServiceFactoryRegistry;

const TAG: &str = "ServiceRegistration";

/// Guard around a project's registration routine.
#[derive(Debug, Default)]
pub struct ServiceRegistration {
    done: AtomicBool,
}

impl ServiceRegistration {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Run `register` against `registry` the first time only.
    ///
    /// Returns `true` when the registrations ran on this call.
    pub fn register_project_services<F>(&self, registry: &ServiceFactoryRegistry, register: F) -> bool
    where
        F: FnOnce(&ServiceFactoryRegistry),
    {
        if self.done.swap(true, Ordering::AcqRel) {
            log::debug!(target: TAG, "Services already registered, skipping");
            return false;
        }

        log::info!(target: TAG, "Registering project services...");
        register(registry);
        log::info!(
            target: TAG,
            "Service registration complete ({} registered)",
            registry.count()
        );
        true
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
