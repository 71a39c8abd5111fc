//! Boot sequence of the main context.
//!
//! Registers the project services, constructs the lifecycle manager (which
//! brings the platform up), bumps the persisted boot counter and requests
//! the startup pass. Memory use is logged around manager construction.

use std::sync::Arc;

use sysinfo::{ProcessesToUpdate, System};

use servicecore::{HostPlatform, ServiceResult};
use servicemanagement::{
    ManagerConfig, ServiceFactoryRegistry, ServiceLifecycleManager, ServiceRegistration,
};

use crate::registration::{register_appliance_services, ApplianceServices};
use crate::services::LoopGroup;

const TAG: &str = "Main";

pub const BOOT_COUNT_KEY: &str = "boot_count";

pub struct Appliance {
    pub platform: Arc<HostPlatform>,
    pub manager: ServiceLifecycleManager,
    /// Persisted boot counter, `None` when storage is unavailable
    pub boot_count: Option<u64>,
    /// Aggregate result of the startup pass
    pub startup: ServiceResult<()>,
    /// Loops of the demo services the manager started
    pub loops: LoopGroup,
}

impl Appliance {
    /// End the demo service loops. The manager keeps its records.
    pub fn stop_services(&self) {
        log::info!(target: TAG, "Stopping {} service loop(s)", self.loops.running());
        self.loops.stop_all();
    }
}

/// Memory figures of the host and of this process, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub process: Option<u64>,
    pub used: u64,
    pub total: u64,
}

impl MemoryUsage {
    pub fn sample() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let process = sysinfo::get_current_pid().ok().and_then(|pid| {
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            sys.process(pid).map(|p| p.memory())
        });

        Self {
            process,
            used: sys.used_memory(),
            total: sys.total_memory(),
        }
    }
}

fn log_memory(stage: &str) {
    if !log::log_enabled!(target: TAG, log::Level::Debug) {
        return;
    }
    let usage = MemoryUsage::sample();
    log::debug!(
        target: TAG,
        "RAM {} service manager: process {} KiB, system {}/{} KiB",
        stage,
        usage.process.map_or_else(|| "?".to_string(), |b| (b / 1024).to_string()),
        usage.used / 1024,
        usage.total / 1024
    );
}

pub fn boot(
    platform: Arc<HostPlatform>,
    registration: &ServiceRegistration,
    services: ApplianceServices,
    config: ManagerConfig,
) -> Appliance {
    let registry = Arc::new(ServiceFactoryRegistry::new());
    let services = services.with_platform(platform.clone());
    register_appliance_services(registration, &registry, &services);

    log_memory("before");
    let manager = ServiceLifecycleManager::new(registry, platform.as_ref(), config);
    log_memory("after");
    let boot_count = bump_boot_count(&platform);

    let startup = manager.request_startup();
    match &startup {
        Ok(()) => log::info!(target: TAG, "All registered services started"),
        Err(e) => log::error!(target: TAG, "Service startup incomplete: {}", e),
    }

    Appliance {
        platform,
        manager,
        boot_count,
        startup,
        loops: services.loops,
    }
}

fn bump_boot_count(platform: &HostPlatform) -> Option<u64> {
    let result = platform.with_storage(|nvs| {
        let count = nvs.get(BOOT_COUNT_KEY).and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        nvs.set(BOOT_COUNT_KEY, serde_json::json!(count));
        nvs.commit().map(|()| count)
    });

    match result {
        Ok(Ok(count)) => {
            log::info!(target: TAG, "Boot #{}", count);
            Some(count)
        }
        Ok(Err(e)) | Err(e) => {
            log::warn!(target: TAG, "Boot counter unavailable: {}", e);
            None
        }
    }
}
