//! Demo services shipped with the appliance
//!
//! Each service runs a small periodic loop in its own task:
//! - `UiService` publishes display frames on the shared bus
//! - `MatterService` announces commissioning and reports attributes
//! - `MqttService` drains the shared bus and forwards what it finds

pub mod matter;
pub mod mqtt;
pub mod ui;

pub use matter::MatterService;
pub use mqtt::MqttService;
pub use ui::UiService;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use servicecore::{spawn_task, ServiceError, ServiceIdentity, ServiceResult, TaskHandle, TaskPriority};

/// Default tick period of the demo loops.
pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Run state shared between a demo service and its task.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
}

impl LoopState {
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the loop to end after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Loops of every demo service a build created, for stopping them together.
#[derive(Debug, Clone, Default)]
pub struct LoopGroup {
    states: Arc<Mutex<Vec<LoopState>>>,
}

impl LoopGroup {
    pub fn track(&self, state: &LoopState) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(state.clone());
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loops still running.
    pub fn running(&self) -> usize {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.is_running())
            .count()
    }

    pub fn stop_all(&self) {
        for state in self.states.lock().unwrap_or_else(PoisonError::into_inner).iter() {
            state.stop();
        }
    }
}

/// Spawn the periodic loop of a demo service.
///
/// A service runs at most one loop; a second start is refused.
pub(crate) fn spawn_loop<F>(
    name: &str,
    identity: ServiceIdentity,
    priority: TaskPriority,
    stack_bytes: usize,
    period: Duration,
    state: &LoopState,
    mut tick: F,
) -> ServiceResult<TaskHandle>
where
    F: FnMut(u64) + Send + 'static,
{
    if state.running.swap(true, Ordering::AcqRel) {
        return Err(ServiceError::StartFailed {
            identity,
            reason: "task already running".to_string(),
        });
    }

    let loop_state = state.clone();
    let task_name = name.to_string();
    let spawned = spawn_task(name, priority, stack_bytes, move || {
        while loop_state.is_running() {
            let n = loop_state.ticks.fetch_add(1, Ordering::AcqRel) + 1;
            tick(n);
            std::thread::sleep(period);
        }
        log::debug!(target: "Task", "{} loop stopped", task_name);
    });

    if spawned.is_err() {
        state.running.store(false, Ordering::Release);
    }
    spawned
}
