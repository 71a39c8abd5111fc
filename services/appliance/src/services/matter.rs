//! MatterService - smart-home protocol stack stand-in
//!
//! Announces commissioning on its first tick, then sends an attribute
//! report every `report_every` ticks.

use std::time::Duration;

use servicecore::{
    BusMessage, Service, ServiceIdentity, ServiceResult, SharedBus, TaskHandle, TaskPriority,
};

use super::{spawn_loop, LoopState, DEFAULT_TICK};

pub struct MatterService {
    name: String,
    identity: ServiceIdentity,
    bus: Option<SharedBus>,
    period: Duration,
    report_every: u64,
    state: LoopState,
}

impl MatterService {
    pub fn new(name: &str, identity: ServiceIdentity, bus: Option<SharedBus>) -> Self {
        Self {
            name: name.to_string(),
            identity,
            bus,
            period: DEFAULT_TICK,
            report_every: 20,
            state: LoopState::default(),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_report_every(mut self, ticks: u64) -> Self {
        self.report_every = ticks.max(1);
        self
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }
}

impl Service for MatterService {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> ServiceIdentity {
        self.identity
    }

    fn task_init(&self, priority: TaskPriority, stack_bytes: usize) -> ServiceResult<TaskHandle> {
        let bus = self.bus.clone();
        let identity = self.identity;
        let report_every = self.report_every;

        spawn_loop(
            &self.name,
            identity,
            priority,
            stack_bytes,
            self.period,
            &self.state,
            move |tick| {
                let (topic, payload) = if tick == 1 {
                    log::info!("MATTER: commissioning window open");
                    ("matter/commissioned", serde_json::json!({ "fabric": 1 }))
                } else if tick % report_every == 0 {
                    ("matter/attribute_report", serde_json::json!({ "tick": tick }))
                } else {
                    return;
                };

                if let Some(bus) = &bus {
                    let _ = bus.publish(BusMessage {
                        source: identity,
                        topic: topic.to_string(),
                        payload,
                    });
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matter_announces_then_reports() {
        let bus = SharedBus::new(16);
        let matter = MatterService::new("MATTER", ServiceIdentity::MATTER, Some(bus.clone()))
            .with_period(Duration::from_millis(1))
            .with_report_every(2);

        let task = matter.task_init(TaskPriority::SERVICE, 50 * 1024).unwrap();
        let rx = bus.receiver();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.topic, "matter/commissioned");
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(second.topic, "matter/attribute_report");
        assert_eq!(second.payload["tick"], 2);

        matter.state().stop();
        task.join().unwrap();
    }
}
