//! Appliance service registration
//!
//! Registers the services this build ships, as selected on the command line.
//! Factories are construct-or-fetch singletons and pick the shared bus up
//! from the host platform when the manager creates them, after bring-up.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use servicecore::{HostPlatform, ServiceIdentity, SharedBus};
use servicemanagement::{ServiceFactoryRegistry, ServiceRegistration};

use crate::services::{LoopGroup, MatterService, MqttService, UiService, DEFAULT_TICK};

const TAG: &str = "ServiceRegistration";

/// Services compiled into the appliance, in identity order.
pub const PROJECT_SERVICES: [ServiceIdentity; 3] = [
    ServiceIdentity::UI,
    ServiceIdentity::MATTER,
    ServiceIdentity::MQTT,
];

/// Which services to register and what they are wired to.
#[derive(Clone)]
pub struct ApplianceServices {
    pub selection: Vec<ServiceIdentity>,
    pub platform: Option<Arc<HostPlatform>>,
    pub mqtt_broker: String,
    pub tick: Duration,
    /// Loops of the services the factories create
    pub loops: LoopGroup,
}

impl ApplianceServices {
    pub fn new(selection: Vec<ServiceIdentity>) -> Self {
        Self {
            selection,
            platform: None,
            mqtt_broker: "127.0.0.1:1883".to_string(),
            tick: DEFAULT_TICK,
            loops: LoopGroup::default(),
        }
    }

    pub fn with_platform(mut self, platform: Arc<HostPlatform>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_mqtt_broker(mut self, broker: &str) -> Self {
        self.mqtt_broker = broker.to_string();
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

/// Parse a comma-separated list of service names, e.g. `ui,mqtt`.
///
/// An empty list selects nothing.
pub fn parse_selection(list: &str) -> anyhow::Result<Vec<ServiceIdentity>> {
    let mut selection = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let identity = ServiceIdentity::from_name(name)
            .with_context(|| format!("unknown service '{}'", name))?;
        if !PROJECT_SERVICES.contains(&identity) {
            bail!("service '{}' is not shipped with this build", identity.name());
        }
        if !selection.contains(&identity) {
            selection.push(identity);
        }
    }
    selection.sort();
    Ok(selection)
}

/// Register the selected services once per `registration` guard.
///
/// Returns `true` when the registrations ran on this call.
pub fn register_appliance_services(
    registration: &ServiceRegistration,
    registry: &ServiceFactoryRegistry,
    services: &ApplianceServices,
) -> bool {
    registration.register_project_services(registry, |registry| {
        for identity in &services.selection {
            register_service(registry, *identity, services);
        }
    })
}

fn register_service(
    registry: &ServiceFactoryRegistry,
    identity: ServiceIdentity,
    services: &ApplianceServices,
) {
    let platform = services.platform.clone();
    let tick = services.tick;
    let loops = services.loops.clone();

    match identity {
        ServiceIdentity::UI => {
            registry.register_singleton(identity, move |name, id| {
                let service = UiService::new(name, id, bus_of(&platform)).with_period(tick);
                loops.track(service.state());
                Some(service)
            });
        }
        ServiceIdentity::MATTER => {
            registry.register_singleton(identity, move |name, id| {
                let service = MatterService::new(name, id, bus_of(&platform)).with_period(tick);
                loops.track(service.state());
                Some(service)
            });
        }
        ServiceIdentity::MQTT => {
            let broker = services.mqtt_broker.clone();
            registry.register_singleton(identity, move |name, id| {
                let service = MqttService::new(name, id, &broker, bus_of(&platform)).with_period(tick);
                loops.track(service.state());
                Some(service)
            });
        }
        other => log::warn!(target: TAG, "No service shipped for {}, skipping", other),
    }
}

fn bus_of(platform: &Option<Arc<HostPlatform>>) -> Option<SharedBus> {
    platform.as_ref().and_then(|p| p.bus())
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicecore::Service;

    #[test]
    fn test_parse_selection() {
        assert_eq!(
            parse_selection("mqtt, UI,ui").unwrap(),
            vec![ServiceIdentity::UI, ServiceIdentity::MQTT]
        );
        assert!(parse_selection("").unwrap().is_empty());
        assert!(parse_selection("ui,zigbee").is_err());
        assert!(parse_selection("log").is_err());
        assert!(parse_selection("srv_mngr").is_err());
    }

    #[test]
    fn test_registers_selection_once() {
        let registry = ServiceFactoryRegistry::new();
        let registration = ServiceRegistration::new();
        let services = ApplianceServices::new(vec![ServiceIdentity::UI, ServiceIdentity::MQTT]);

        assert!(register_appliance_services(&registration, &registry, &services));
        assert!(!register_appliance_services(
            &registration,
            &registry,
            &ApplianceServices::new(PROJECT_SERVICES.to_vec())
        ));

        assert_eq!(
            registry.registered(),
            vec![ServiceIdentity::UI, ServiceIdentity::MQTT]
        );
    }

    #[test]
    fn test_factories_hand_out_singletons() {
        let registry = ServiceFactoryRegistry::new();
        let services = ApplianceServices::new(PROJECT_SERVICES.to_vec()).with_mqtt_broker("broker:1883");
        register_appliance_services(&ServiceRegistration::new(), &registry, &services);

        let first = registry.create(ServiceIdentity::MQTT, "MQTT").unwrap();
        let second = registry.create(ServiceIdentity::MQTT, "MQTT").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(services.loops.len(), 1);
        assert_eq!(first.name(), "MQTT");
        assert_eq!(first.identity(), ServiceIdentity::MQTT);
    }

    #[test]
    fn test_unshipped_identity_is_not_registered() {
        let registry = ServiceFactoryRegistry::new();
        let services = ApplianceServices::new(vec![ServiceIdentity::LOG]);
        register_appliance_services(&ServiceRegistration::new(), &registry, &services);
        assert_eq!(registry.count(), 0);
    }
}
