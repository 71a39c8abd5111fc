//! MqttService - bus forwarder
//!
//! Drains the shared bus every tick and forwards each message towards the
//! configured broker under `<prefix>/<topic>`. There is no network client on
//! the host build; forwarded messages are logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use servicecore::{
    Service, ServiceError, ServiceIdentity, ServiceResult, SharedBus, TaskHandle, TaskPriority,
};

use super::{spawn_loop, LoopState, DEFAULT_TICK};

pub struct MqttService {
    name: String,
    identity: ServiceIdentity,
    broker: String,
    prefix: String,
    bus: Option<SharedBus>,
    period: Duration,
    forwarded: Arc<AtomicU64>,
    state: LoopState,
}

impl MqttService {
    pub fn new(name: &str, identity: ServiceIdentity, broker: &str, bus: Option<SharedBus>) -> Self {
        Self {
            name: name.to_string(),
            identity,
            broker: broker.to_string(),
            prefix: "appliance".to_string(),
            bus,
            period: DEFAULT_TICK,
            forwarded: Arc::new(AtomicU64::new(0)),
            state: LoopState::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }

    /// Messages forwarded since start.
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Acquire)
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }
}

impl Service for MqttService {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> ServiceIdentity {
        self.identity
    }

    fn task_init(&self, priority: TaskPriority, stack_bytes: usize) -> ServiceResult<TaskHandle> {
        if self.broker.trim().is_empty() {
            return Err(ServiceError::StartFailed {
                identity: self.identity,
                reason: "no broker".to_string(),
            });
        }

        let rx = self.bus.as_ref().map(SharedBus::receiver);
        let forwarded = self.forwarded.clone();
        let broker = self.broker.clone();
        let prefix = self.prefix.clone();

        log::info!("MQTT: forwarding bus traffic to {}", broker);
        spawn_loop(
            &self.name,
            self.identity,
            priority,
            stack_bytes,
            self.period,
            &self.state,
            move |_| {
                let Some(rx) = &rx else { return };
                for msg in rx.try_iter() {
                    log::debug!("MQTT: {} <- {}/{} {}", broker, prefix, msg.topic, msg.payload);
                    forwarded.fetch_add(1, Ordering::AcqRel);
                }
            },
        )
    }
}
