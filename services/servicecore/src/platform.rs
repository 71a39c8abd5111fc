//! Platform bring-up collaborators.
//!
//! The lifecycle manager runs these once while it is being constructed:
//! - non-volatile storage
//! - persistent filesystem
//! - shared communication bus
//!
//! Each step reports a status. Callers log it and carry on.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::identity::ServiceIdentity;

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Non-volatile storage init failed: {0}")]
    Storage(String),
    #[error("Filesystem init failed: {0}")]
    Filesystem(String),
    #[error("Shared bus init failed: {0}")]
    SharedBus(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Bring-up steps the manager performs before creating its own task.
pub trait PlatformBringUp: Send + Sync {
    fn init_storage(&self) -> PlatformResult<()>;

    fn init_filesystem(&self) -> PlatformResult<()>;

    fn init_shared_bus(&self) -> PlatformResult<()>;
}

/// Message carried on the shared bus.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub source: ServiceIdentity,
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Bounded multi-producer bus shared by services.
#[derive(Clone)]
pub struct SharedBus {
    tx: Sender<BusMessage>,
    rx: Receiver<BusMessage>,
}

impl SharedBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<BusMessage> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<BusMessage> {
        self.rx.clone()
    }

    /// Non-blocking publish. Returns `false` when the bus is full.
    pub fn publish(&self, message: BusMessage) -> bool {
        self.tx.try_send(message).is_ok()
    }
}

/// JSON-backed key/value store standing in for NVS flash.
#[derive(Debug)]
pub struct NvsStore {
    path: PathBuf,
    entries: BTreeMap<String, serde_json::Value>,
}

impl NvsStore {
    /// Open the store at `path`, creating an empty one if it does not exist.
    pub fn open(path: &Path) -> PlatformResult<Self> {
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| PlatformError::Storage(format!("{}: {}", path.display(), e)))?;
            serde_json::from_str(&raw)
                .map_err(|e| PlatformError::Storage(format!("{}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };

        let store = Self {
            path: path.to_path_buf(),
            entries,
        };
        store.commit()?;
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.entries.insert(key.to_string(), value);
    }

    /// Flush all entries to disk.
    pub fn commit(&self) -> PlatformResult<()> {
        let raw = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| PlatformError::Storage(e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| PlatformError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

/// Bring-up against a host data directory.
pub struct HostPlatform {
    data_dir: PathBuf,
    bus_capacity: usize,
    storage: Mutex<Option<NvsStore>>,
    bus: OnceLock<SharedBus>,
}

impl HostPlatform {
    pub const NVS_FILE: &'static str = "nvs.json";
    pub const FS_DIR: &'static str = "fs";

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            bus_capacity: 256,
            storage: Mutex::new(None),
            bus: OnceLock::new(),
        }
    }

    pub fn with_bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn filesystem_root(&self) -> PathBuf {
        self.data_dir.join(Self::FS_DIR)
    }

    /// Shared bus, once `init_shared_bus` has run.
    pub fn bus(&self) -> Option<SharedBus> {
        self.bus.get().cloned()
    }

    /// Run `f` against the opened storage.
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut NvsStore) -> R) -> PlatformResult<R> {
        let mut guard = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(store) => Ok(f(store)),
            None => Err(PlatformError::Storage("storage not initialized".to_string())),
        }
    }
}

impl PlatformBringUp for HostPlatform {
    fn init_storage(&self) -> PlatformResult<()> {
        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| PlatformError::Storage(format!("{}: {}", self.data_dir.display(), e)))?;
        let store = NvsStore::open(&self.data_dir.join(Self::NVS_FILE))?;
        log::debug!(target: "Platform", "NVS opened with {} entries", store.entries.len());
        *self.storage.lock().unwrap_or_else(PoisonError::into_inner) = Some(store);
        Ok(())
    }

    fn init_filesystem(&self) -> PlatformResult<()> {
        let root = self.filesystem_root();
        std::fs::create_dir_all(&root)
            .map_err(|e| PlatformError::Filesystem(format!("{}: {}", root.display(), e)))?;
        log::debug!(target: "Platform", "Filesystem mounted at {}", root.display());
        Ok(())
    }

    fn init_shared_bus(&self) -> PlatformResult<()> {
        if self.bus_capacity == 0 {
            return Err(PlatformError::SharedBus("zero bus capacity".to_string()));
        }
        self.bus.get_or_init(|| {
            log::debug!(target: "Platform", "Shared bus created (capacity {})", self.bus_capacity);
            SharedBus::new(self.bus_capacity)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_platform_bring_up() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(dir.path().join("device"));

        platform.init_storage().unwrap();
        platform.init_filesystem().unwrap();
        platform.init_shared_bus().unwrap();

        assert!(dir.path().join("device").join(HostPlatform::NVS_FILE).exists());
        assert!(platform.filesystem_root().is_dir());
        assert!(platform.bus().is_some());
    }

    #[test]
    fn test_storage_persists_between_opens() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(dir.path());
        platform.init_storage().unwrap();
        platform
            .with_storage(|nvs| {
                nvs.set("boot_count", serde_json::json!(3));
                nvs.commit()
            })
            .unwrap()
            .unwrap();

        let reopened = NvsStore::open(&dir.path().join(HostPlatform::NVS_FILE)).unwrap();
        assert_eq!(reopened.get("boot_count"), Some(&serde_json::json!(3)));
    }

    #[test]
    fn test_storage_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(dir.path());
        assert!(platform.with_storage(|_| ()).is_err());
    }

    #[test]
    fn test_corrupt_storage_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HostPlatform::NVS_FILE), "not json").unwrap();
        let platform = HostPlatform::new(dir.path());
        assert!(matches!(platform.init_storage(), Err(PlatformError::Storage(_))));
    }

    #[test]
    fn test_shared_bus_rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(dir.path()).with_bus_capacity(0);
        assert!(platform.init_shared_bus().is_err());
        assert!(platform.bus().is_none());
    }

    #[test]
    fn test_bus_publish() {
        let bus = SharedBus::new(1);
        let msg = BusMessage {
            source: ServiceIdentity::UI,
            topic: "online".to_string(),
            payload: serde_json::Value::Null,
        };
        assert!(bus.publish(msg.clone()));
        assert!(!bus.publish(msg));
        assert_eq!(bus.receiver().try_recv().unwrap().source, ServiceIdentity::UI);
    }
}
