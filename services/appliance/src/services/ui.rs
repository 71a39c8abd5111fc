//! UiService - display loop
//!
//! Publishes a `ui/frame` message on the shared bus every tick.

use std::time::Duration;

use servicecore::{
    BusMessage, Service, ServiceIdentity, ServiceResult, SharedBus, TaskHandle, TaskPriority,
};

use super::{spawn_loop, LoopState, DEFAULT_TICK};

pub struct UiService {
    name: String,
    identity: ServiceIdentity,
    bus: Option<SharedBus>,
    period: Duration,
    state: LoopState,
}

impl UiService {
    pub fn new(name: &str, identity: ServiceIdentity, bus: Option<SharedBus>) -> Self {
        Self {
            name: name.to_string(),
            identity,
            bus,
            period: DEFAULT_TICK,
            state: LoopState::default(),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }
}

impl Service for UiService {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> ServiceIdentity {
        self.identity
    }

    fn task_init(&self, priority: TaskPriority, stack_bytes: usize) -> ServiceResult<TaskHandle> {
        let bus = self.bus.clone();
        let identity = self.identity;

        spawn_loop(
            &self.name,
            identity,
            priority,
            stack_bytes,
            self.period,
            &self.state,
            move |frame| {
                let Some(bus) = &bus else { return };
                let sent = bus.publish(BusMessage {
                    source: identity,
                    topic: "ui/frame".to_string(),
                    payload: serde_json::json!({ "frame": frame }),
                });
                if !sent {
                    log::trace!("UI: bus full, dropped frame {}", frame);
                }
            },
        )
    }
}
