//! Manager configuration for the appliance binary.
//!
//! Starts from `ManagerConfig::default()`, optionally replaced by a JSON file,
//! with the display settle time overridable from the command line.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use servicecore::ServiceIdentity;
use servicemanagement::{ManagerConfig, StartupDelay};

pub fn load_manager_config(
    path: Option<&Path>,
    display_settle_ms: Option<u64>,
) -> anyhow::Result<ManagerConfig> {
    let mut config: ManagerConfig = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading manager config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing manager config {}", path.display()))?
        }
        None => ManagerConfig::default(),
    };

    if let Some(ms) = display_settle_ms {
        config
            .startup_delays
            .retain(|d| !(d.after == ServiceIdentity::UI && d.before == ServiceIdentity::MATTER));
        if ms > 0 {
            config.startup_delays.push(StartupDelay::new(
                ServiceIdentity::UI,
                ServiceIdentity::MATTER,
                Duration::from_millis(ms),
            ));
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_file() {
        let config = load_manager_config(None, None).unwrap();
        assert_eq!(config.startup_delays.len(), 1);
        assert_eq!(config.startup_delays[0].delay_ms, 500);
    }

    #[test]
    fn test_settle_override() {
        let config = load_manager_config(None, Some(20)).unwrap();
        assert_eq!(config.startup_delays.len(), 1);
        assert_eq!(config.startup_delays[0].delay(), Duration::from_millis(20));

        let config = load_manager_config(None, Some(0)).unwrap();
        assert!(config.startup_delays.is_empty());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manager.json");
        std::fs::write(&path, r#"{ "name": "MNGR", "command_capacity": 2 }"#).unwrap();

        let config = load_manager_config(Some(&path), None).unwrap();
        assert_eq!(config.name, "MNGR");
        assert_eq!(config.command_capacity, 2);
        assert_eq!(config.identity, ServiceIdentity::SERVICE_MANAGER);
    }

    #[test]
    fn test_bad_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manager.json");
        std::fs::write(&path, "{").unwrap();
        assert!(load_manager_config(Some(&path), None).is_err());
        assert!(load_manager_config(Some(&dir.path().join("missing.json")), None).is_err());
    }
}
