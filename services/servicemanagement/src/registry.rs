//! Service Factory Registry
//!
//! Maps service identities to the functions that construct them, so the
//! lifecycle manager can create services without knowing their concrete types.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use servicecore::{Service, ServiceIdentity, SharedService, IDENTITY_SLOTS};

const TAG: &str = "ServiceFactory";

/// Construction function: `(execution-context name, identity) -> service`.
pub type ServiceFactory = Arc<dyn Fn(&str, ServiceIdentity) -> Option<SharedService> + Send + Sync>;

/// Registry for service factory functions, one slot per identity.
pub struct ServiceFactoryRegistry {
    factories: RwLock<[Option<ServiceFactory>; IDENTITY_SLOTS]>,
}

impl ServiceFactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(std::array::from_fn(|_| None)),
        }
    }

    /// Register a factory for `identity`.
    ///
    /// Returns `false` for `NONE` and anything at or past `COUNT`. A factory
    /// already in the slot is replaced.
    pub fn register<F>(&self, identity: ServiceIdentity, factory: F) -> bool
    where
        F: Fn(&str, ServiceIdentity) -> Option<SharedService> + Send + Sync + 'static,
    {
        let Some(idx) = identity.index() else {
            log::error!(target: TAG, "Invalid service ID: {}", identity);
            return false;
        };

        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);
        if factories[idx].is_some() {
            log::warn!(target: TAG, "Service {} already registered, overwriting", identity);
        }
        factories[idx] = Some(Arc::new(factory));

        log::info!(target: TAG, "Service {} registered successfully", identity);
        true
    }

    /// Register a construct-or-fetch singleton for `identity`.
    ///
    /// `ctor` runs on the first `create` that reaches this factory; later calls
    /// hand out the same instance. A constructor that yields nothing is tried
    /// again next time.
    pub fn register_singleton<S, F>(&self, identity: ServiceIdentity, ctor: F) -> bool
    where
        S: Service + 'static,
        F: Fn(&str, ServiceIdentity) -> Option<S> + Send + Sync + 'static,
    {
        let instance: Mutex<Option<SharedService>> = Mutex::new(None);

        self.register(identity, move |name, id| {
            let mut slot = instance.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = slot.as_ref() {
                return Some(existing.clone());
            }
            let created: SharedService = Arc::new(ctor(name, id)?);
            *slot = Some(created.clone());
            Some(created)
        })
    }

    /// Whether a factory is registered. `false` for invalid identities.
    pub fn is_registered(&self, identity: ServiceIdentity) -> bool {
        match identity.index() {
            Some(idx) => self.factories.read().unwrap_or_else(PoisonError::into_inner)[idx].is_some(),
            None => false,
        }
    }

    /// Create a service through its registered factory.
    ///
    /// The factory's result is passed through untouched, so `None` means either
    /// a bad identity, an empty slot or a factory that failed.
    pub fn create(&self, identity: ServiceIdentity, context_name: &str) -> Option<SharedService> {
        let Some(idx) = identity.index() else {
            log::error!(target: TAG, "Invalid service ID: {}", identity);
            return None;
        };

        // Clone the factory out so it runs without the table locked.
        let factory = self.factories.read().unwrap_or_else(PoisonError::into_inner)[idx].clone();

        match factory {
            Some(factory) => factory(context_name, identity),
            None => {
                log::warn!(target: TAG, "Service {} not registered", identity);
                None
            }
        }
    }

    /// All identities with a factory, ascending.
    pub fn registered(&self) -> Vec<ServiceIdentity> {
        let factories = self.factories.read().unwrap_or_else(PoisonError::into_inner);
        ServiceIdentity::all()
            .filter(|id| id.index().is_some_and(|idx| factories[idx].is_some()))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.registered().len()
    }
}

impl Default for ServiceFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use servicecore::{spawn_task, ServiceResult, TaskHandle, TaskPriority};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockService {
        name: String,
        identity: ServiceIdentity,
    }

    impl MockService {
        fn new(name: &str, identity: ServiceIdentity) -> Self {
            Self {
                name: name.to_string(),
                identity,
            }
        }
    }

    impl Service for MockService {
        fn name(&self) -> &str {
            &self.name
        }

        fn identity(&self) -> ServiceIdentity {
            self.identity
        }

        fn task_init(&self, priority: TaskPriority, stack_bytes: usize) -> ServiceResult<TaskHandle> {
            spawn_task(&self.name, priority, stack_bytes, || {})
        }
    }

    fn mock_factory() -> impl Fn(&str, ServiceIdentity) -> Option<SharedService> + Send + Sync {
        |name: &str, id: ServiceIdentity| Some(Arc::new(MockService::new(name, id)) as SharedService)
    }

    #[test]
    fn test_register_valid_identities() {
        let registry = ServiceFactoryRegistry::new();

        for id in ServiceIdentity::all() {
            assert!(!registry.is_registered(id));
            assert!(registry.register(id, mock_factory()));
            assert!(registry.is_registered(id));
        }
        assert_eq!(registry.count(), ServiceIdentity::all().count());
    }

    #[test]
    fn test_register_rejects_sentinels() {
        let registry = ServiceFactoryRegistry::new();

        for id in [
            ServiceIdentity::NONE,
            ServiceIdentity::COUNT,
            ServiceIdentity::from_raw(ServiceIdentity::COUNT.raw() + 1),
            ServiceIdentity::from_raw(u8::MAX),
        ] {
            assert!(!registry.register(id, mock_factory()));
            assert!(!registry.is_registered(id));
        }
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_reregistration_overwrites() {
        let registry = ServiceFactoryRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for generation in [1u32, 2] {
            let seen = seen.clone();
            assert!(registry.register(ServiceIdentity::UI, move |name, id| {
                seen.lock().unwrap().push(generation);
                Some(Arc::new(MockService::new(name, id)) as SharedService)
            }));
        }

        let service = registry.create(ServiceIdentity::UI, "UI").unwrap();
        assert_eq!(service.name(), "UI");
        assert_eq!(*seen.lock().unwrap(), vec![2]);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_create_unregistered_returns_none() {
        let registry = ServiceFactoryRegistry::new();
        registry.register(ServiceIdentity::UI, mock_factory());

        assert!(registry.create(ServiceIdentity::MQTT, "MQTT").is_none());
    }

    #[test]
    fn test_create_invalid_never_calls_factory() {
        let registry = ServiceFactoryRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for id in ServiceIdentity::all() {
            let calls = calls.clone();
            registry.register(id, move |name, id| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(Arc::new(MockService::new(name, id)) as SharedService)
            });
        }

        assert!(registry.create(ServiceIdentity::NONE, "x").is_none());
        assert!(registry.create(ServiceIdentity::COUNT, "x").is_none());
        assert!(registry.create(ServiceIdentity::from_raw(99), "x").is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_create_passes_factory_failure_through() {
        let registry = ServiceFactoryRegistry::new();
        registry.register(ServiceIdentity::MATTER, |_, _| None);

        assert!(registry.is_registered(ServiceIdentity::MATTER));
        assert!(registry.create(ServiceIdentity::MATTER, "MATTER").is_none());
    }

    #[test]
    fn test_create_hands_name_and_identity_to_factory() {
        let registry = ServiceFactoryRegistry::new();
        registry.register(ServiceIdentity::MQTT, mock_factory());

        let service = registry.create(ServiceIdentity::MQTT, "custom").unwrap();
        assert_eq!(service.name(), "custom");
        assert_eq!(service.identity(), ServiceIdentity::MQTT);
    }

    #[test]
    fn test_singleton_factory_returns_same_instance() {
        let registry = ServiceFactoryRegistry::new();
        let constructed = Arc::new(AtomicUsize::new(0));
        let counter = constructed.clone();

        registry.register_singleton(ServiceIdentity::UI, move |name, id| {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(MockService::new(name, id))
        });

        let first = registry.create(ServiceIdentity::UI, "UI").unwrap();
        let second = registry.create(ServiceIdentity::UI, "UI").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_singleton_retries_after_failed_construction() {
        let registry = ServiceFactoryRegistry::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        registry.register_singleton(ServiceIdentity::MQTT, move |name, id| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            (attempt > 0).then(|| MockService::new(name, id))
        });

        assert!(registry.create(ServiceIdentity::MQTT, "MQTT").is_none());
        assert!(registry.create(ServiceIdentity::MQTT, "MQTT").is_some());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registered_lists_ascending() {
        let registry = ServiceFactoryRegistry::new();
        registry.register(ServiceIdentity::MQTT, mock_factory());
        registry.register(ServiceIdentity::UI, mock_factory());

        assert_eq!(
            registry.registered(),
            vec![ServiceIdentity::UI, ServiceIdentity::MQTT]
        );
    }
}
