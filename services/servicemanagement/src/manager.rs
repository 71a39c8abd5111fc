//! Service Lifecycle Manager
//!
//! Brings the platform up, runs its own lifecycle task and, on a startup
//! trigger, creates and starts every registered service in identity order.
//! A failing service never stops the pass; the first failure is what the
//! trigger reports.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::Sender;
use servicecore::{
    PlatformBringUp, PlatformResult, ServiceError, ServiceIdentity, ServiceResult, SharedService,
    TaskHandle, TaskInfo, TaskPriority, IDENTITY_SLOTS,
};

use crate::dispatcher::{self, LifecycleCommand};
use crate::registry::ServiceFactoryRegistry;
use crate::report::{ServiceState, StartupOutcome, StartupReport};

const TAG: &str = "ServiceMngr";

/// Settle time inserted after `after` is started, when `before` is registered.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StartupDelay {
    pub after: ServiceIdentity,
    pub before: ServiceIdentity,
    pub delay_ms: u64,
}

impl StartupDelay {
    pub fn new(after: ServiceIdentity, before: ServiceIdentity, delay: Duration) -> Self {
        Self {
            after,
            before,
            delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Manager configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Name of the manager's own task
    pub name: String,
    /// Identity of the manager itself; picks its stack budget
    pub identity: ServiceIdentity,
    /// Priority of the manager task and of every service task
    pub priority: TaskPriority,
    /// Ordering hints between identity pairs
    pub startup_delays: Vec<StartupDelay>,
    /// Capacity of the lifecycle command channel
    pub command_capacity: usize,
}

impl ManagerConfig {
    /// Display needs to settle its interrupt handlers before networking starts.
    pub const DISPLAY_SETTLE: Duration = Duration::from_millis(500);

    pub fn with_startup_delays(mut self, delays: Vec<StartupDelay>) -> Self {
        self.startup_delays = delays;
        self
    }

    pub fn without_startup_delays(self) -> Self {
        self.with_startup_delays(Vec::new())
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            name: ServiceIdentity::SERVICE_MANAGER.name().to_string(),
            identity: ServiceIdentity::SERVICE_MANAGER,
            priority: TaskPriority::SERVICE,
            startup_delays: vec![StartupDelay::new(
                ServiceIdentity::UI,
                ServiceIdentity::MATTER,
                Self::DISPLAY_SETTLE,
            )],
            command_capacity: 16,
        }
    }
}

/// Per-identity bookkeeping written during startup.
#[derive(Default)]
struct ServiceRecord {
    service: Option<SharedService>,
    task: Option<TaskHandle>,
    state: ServiceState,
}

/// State shared between the manager handle and its lifecycle task.
pub(crate) struct ManagerCore {
    config: ManagerConfig,
    registry: Arc<ServiceFactoryRegistry>,
    records: Mutex<[ServiceRecord; IDENTITY_SLOTS]>,
    /// Serializes startup passes and direct initializations
    lifecycle: Mutex<()>,
    last_report: Mutex<Option<StartupReport>>,
}

impl ManagerCore {
    fn new(config: ManagerConfig, registry: Arc<ServiceFactoryRegistry>) -> Self {
        Self {
            config,
            registry,
            records: Mutex::new(std::array::from_fn(|_| ServiceRecord::default())),
            lifecycle: Mutex::new(()),
            last_report: Mutex::new(None),
        }
    }

    pub(crate) fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn records(&self) -> MutexGuard<'_, [ServiceRecord; IDENTITY_SLOTS]> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn on_startup_trigger(&self) -> ServiceResult<()> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        log::info!(target: TAG, "Starting registered services...");
        let mut report = StartupReport::new();
        let mut first_error: Option<ServiceError> = None;

        for identity in ServiceIdentity::startup_order() {
            if !self.registry.is_registered(identity) {
                log::info!(target: TAG, "{} service not registered, skipping", identity.name());
                report.record(identity, StartupOutcome::Skipped);
                continue;
            }

            let state = self.state(identity);
            if state.is_settled() {
                log::debug!(target: TAG, "{} service already {:?}, leaving it", identity.name(), state);
                report.record(identity, StartupOutcome::Settled(state));
                if let Some(e) = settled_failure(identity, state) {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                continue;
            }

            match self.initialize_locked(identity) {
                Ok(()) => report.record(identity, StartupOutcome::Started),
                Err(e) => {
                    log::error!(target: TAG, "Failed to initialize {} service: {}", identity.name(), e);
                    let outcome = match &e {
                        ServiceError::CreateFailed(_) => StartupOutcome::CreateFailed(e.to_string()),
                        _ => StartupOutcome::StartFailed(e.to_string()),
                    };
                    report.record(identity, outcome);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }

            self.apply_startup_delays(identity);
        }

        log::info!(
            target: TAG,
            "Startup pass finished: {} started, {} skipped, {} failed",
            report.started().len(),
            report.skipped().len(),
            report.failures().len()
        );
        *self.last_report.lock().unwrap_or_else(PoisonError::into_inner) = Some(report);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn initialize_service(&self, identity: ServiceIdentity) -> ServiceResult<()> {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);

        if self.state(identity) == ServiceState::Started {
            log::debug!(target: TAG, "{} service already started", identity.name());
            return Ok(());
        }
        self.initialize_locked(identity)
    }

    fn initialize_locked(&self, identity: ServiceIdentity) -> ServiceResult<()> {
        let Some(idx) = identity.index() else {
            log::error!(target: TAG, "Invalid service ID: {}", identity);
            return Err(ServiceError::InvalidIdentity(identity));
        };
        let name = identity.name();

        if !self.registry.is_registered(identity) {
            log::warn!(target: TAG, "Service {} not registered", identity);
            return Err(ServiceError::NotRegistered(identity));
        }

        let created = panic::catch_unwind(AssertUnwindSafe(|| self.registry.create(identity, name)))
            .unwrap_or_else(|payload| {
                log::error!(
                    target: TAG,
                    "Factory for {} panicked: {}",
                    identity,
                    panic_message(payload.as_ref())
                );
                None
            });

        let Some(service) = created else {
            log::error!(target: TAG, "Failed to create service {}", identity);
            self.records()[idx].state = ServiceState::CreateFailed;
            return Err(ServiceError::CreateFailed(identity));
        };

        {
            let mut records = self.records();
            records[idx].service = Some(service.clone());
            records[idx].state = ServiceState::Created;
        }

        let started = panic::catch_unwind(AssertUnwindSafe(|| {
            service.task_init(self.config.priority, identity.stack_size())
        }))
        .unwrap_or_else(|payload| {
            Err(ServiceError::StartFailed {
                identity,
                reason: format!("task init panicked: {}", panic_message(payload.as_ref())),
            })
        });

        match started {
            Ok(task) => {
                let mut records = self.records();
                records[idx].task = Some(task);
                records[idx].state = ServiceState::Started;
                log::info!(target: TAG, "{} service created successfully", name);
                Ok(())
            }
            Err(e) => {
                log::error!(target: TAG, "Failed to initialize {} service task: {}", name, e);
                let mut records = self.records();
                records[idx].service = None;
                records[idx].state = ServiceState::StartFailed;
                Err(match e {
                    e @ ServiceError::StartFailed { .. } => e,
                    other => ServiceError::StartFailed {
                        identity,
                        reason: other.to_string(),
                    },
                })
            }
        }
    }

    fn apply_startup_delays(&self, identity: ServiceIdentity) {
        for hint in self.config.startup_delays.iter().filter(|h| h.after == identity) {
            if self.registry.is_registered(hint.before) {
                log::info!(
                    target: TAG,
                    "Waiting {:?} after {} before {}",
                    hint.delay(),
                    identity.name(),
                    hint.before.name()
                );
                std::thread::sleep(hint.delay());
            }
        }
    }

    fn state(&self, identity: ServiceIdentity) -> ServiceState {
        let Some(idx) = identity.index() else {
            return ServiceState::Unregistered;
        };
        match self.records()[idx].state {
            ServiceState::Unregistered | ServiceState::Registered => {
                if self.registry.is_registered(identity) {
                    ServiceState::Registered
                } else {
                    ServiceState::Unregistered
                }
            }
            state => state,
        }
    }

    pub(crate) fn last_report(&self) -> Option<StartupReport> {
        self.last_report.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Service Lifecycle Manager - creates and starts registered services
pub struct ServiceLifecycleManager {
    core: Arc<ManagerCore>,
    commands: Option<Sender<LifecycleCommand>>,
    task: Option<TaskHandle>,
}

impl ServiceLifecycleManager {
    /// Bring the platform up and start the manager's own task.
    ///
    /// Nothing here is fatal: failed bring-up steps and a failed manager task
    /// are logged and construction carries on.
    pub fn new(
        registry: Arc<ServiceFactoryRegistry>,
        platform: &dyn PlatformBringUp,
        config: ManagerConfig,
    ) -> Self {
        log_bring_up("NVS flash", platform.init_storage());
        log_bring_up("Filesystem", platform.init_filesystem());
        log_bring_up("SharedBus", platform.init_shared_bus());

        let name = config.name.clone();
        let core = Arc::new(ManagerCore::new(config, registry));

        let (commands, task) = match dispatcher::spawn_lifecycle_task(core.clone()) {
            Ok((commands, task)) => {
                log::info!(target: TAG, "{} service created.", name);
                (Some(commands), Some(task))
            }
            Err(e) => {
                log::error!(target: TAG, "failed to create {} service: {}", name, e);
                (None, None)
            }
        };

        Self { core, commands, task }
    }

    /// Create with default configuration
    pub fn with_defaults(registry: Arc<ServiceFactoryRegistry>, platform: &dyn PlatformBringUp) -> Self {
        Self::new(registry, platform, ManagerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.core.config.name
    }

    pub fn identity(&self) -> ServiceIdentity {
        self.core.config.identity
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.core.config
    }

    pub fn registry(&self) -> Arc<ServiceFactoryRegistry> {
        self.core.registry.clone()
    }

    /// Run the startup pass on the caller's thread.
    ///
    /// Every registered identity is attempted; the first failure is returned
    /// once the pass is complete.
    pub fn on_startup_trigger(&self) -> ServiceResult<()> {
        self.core.on_startup_trigger()
    }

    /// Run the startup pass on the manager's own task and wait for it.
    ///
    /// Falls back to the caller's thread when the manager task was never
    /// created, has ended, or stops answering.
    pub fn request_startup(&self) -> ServiceResult<()> {
        match &self.commands {
            Some(commands) if self.is_task_running() => match dispatcher::request_startup(commands) {
                Err(ServiceError::ManagerUnavailable(reason)) => {
                    log::warn!(target: TAG, "Manager task unavailable ({}), running startup inline", reason);
                }
                result => return result,
            },
            _ => log::warn!(target: TAG, "No manager task, running startup inline"),
        }
        self.core.on_startup_trigger()
    }

    /// Create and start a single service.
    pub fn initialize_service(&self, identity: ServiceIdentity) -> ServiceResult<()> {
        self.core.initialize_service(identity)
    }

    pub fn state(&self, identity: ServiceIdentity) -> ServiceState {
        self.core.state(identity)
    }

    /// Stored service handle, if any.
    pub fn service(&self, identity: ServiceIdentity) -> Option<SharedService> {
        let idx = identity.index()?;
        self.core.records()[idx].service.clone()
    }

    pub fn has_service(&self, identity: ServiceIdentity) -> bool {
        self.service(identity).is_some()
    }

    pub fn has_task(&self, identity: ServiceIdentity) -> bool {
        self.task_info(identity).is_some()
    }

    pub fn task_info(&self, identity: ServiceIdentity) -> Option<TaskInfo> {
        let idx = identity.index()?;
        self.core.records()[idx].task.as_ref().map(TaskHandle::info)
    }

    /// Report of the most recent startup pass.
    pub fn last_report(&self) -> Option<StartupReport> {
        self.core.last_report()
    }

    /// Whether the manager's own task exists and is still running.
    pub fn is_task_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn status(&self) -> ManagerStatus {
        let services = ServiceIdentity::startup_order()
            .map(|identity| ServiceStatusEntry {
                identity,
                name: identity.name().to_string(),
                state: self.state(identity),
                task: self.task_info(identity),
            })
            .collect();

        ManagerStatus {
            name: self.name().to_string(),
            identity: self.identity(),
            task: self.task.as_ref().map(TaskHandle::info),
            services,
        }
    }
}

/// Aggregate error for an identity a previous pass left failed.
fn settled_failure(identity: ServiceIdentity, state: ServiceState) -> Option<ServiceError> {
    match state {
        ServiceState::CreateFailed => Some(ServiceError::CreateFailed(identity)),
        ServiceState::StartFailed => Some(ServiceError::StartFailed {
            identity,
            reason: "failed in an earlier startup pass".to_string(),
        }),
        _ => None,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_bring_up(step: &str, result: PlatformResult<()>) {
    match result {
        Ok(()) => log::info!(target: TAG, "Initialized {} successfully", step),
        Err(e) => log::error!(target: TAG, "Failed to Initialize {}: {}", step, e),
    }
}

/// Manager status information
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManagerStatus {
    pub name: String,
    pub identity: ServiceIdentity,
    pub task: Option<TaskInfo>,
    pub services: Vec<ServiceStatusEntry>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceStatusEntry {
    pub identity: ServiceIdentity,
    pub name: String,
    pub state: ServiceState,
    pub task: Option<TaskInfo>,
}
