//! Service identities and the static per-identity tables.
//!
//! Identities are small integral tags. `NONE` marks absence and `COUNT` is the
//! exclusive upper bound that also sizes every per-identity table. Raw values
//! outside `NONE < id < COUNT` can be formed on purpose so that callers get a
//! rejection rather than a panic.

use std::fmt;

/// Number of slots in every per-identity table.
pub const IDENTITY_SLOTS: usize = ServiceIdentity::COUNT.0 as usize;

/// Execution-context name per identity.
pub const SERVICE_NAMES: [&str; IDENTITY_SLOTS] = [
    "",         // NONE
    "SRV_MNGR", // SERVICE_MANAGER
    "UI",
    "MATTER",
    "MQTT",
    "LOG",
];

/// Stack budget in bytes per identity.
pub const SERVICE_STACK_SIZES: [usize; IDENTITY_SLOTS] = [
    0,         // NONE
    20 * 1024, // SERVICE_MANAGER
    50 * 1024, // UI
    50 * 1024, // MATTER
    20 * 1024, // MQTT
    0,         // LOG
];

/// Tag naming a logical service slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ServiceIdentity(u8);

impl ServiceIdentity {
    pub const NONE: Self = Self(0);
    pub const SERVICE_MANAGER: Self = Self(1);
    pub const UI: Self = Self(2);
    pub const MATTER: Self = Self(3);
    pub const MQTT: Self = Self(4);
    pub const LOG: Self = Self(5);
    pub const COUNT: Self = Self(6);

    /// Build an identity from its raw tag. No validation happens here.
    pub const fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// `true` iff `NONE < self < COUNT`.
    pub const fn is_valid(self) -> bool {
        self.0 > Self::NONE.0 && self.0 < Self::COUNT.0
    }

    /// Table index, only for valid identities.
    pub fn index(self) -> Option<usize> {
        self.is_valid().then_some(self.0 as usize)
    }

    /// Canonical execution-context name from the static table.
    ///
    /// `NONE` reads as `NO_ID` and out-of-range tags as `UNKNOWN`, so the
    /// result is always printable.
    pub fn name(self) -> &'static str {
        match self.index() {
            Some(idx) if !SERVICE_NAMES[idx].is_empty() => SERVICE_NAMES[idx],
            Some(_) => "UNKNOWN",
            None if self == Self::NONE => "NO_ID",
            None => "UNKNOWN",
        }
    }

    /// Stack budget from the static table, zero for invalid identities.
    pub fn stack_size(self) -> usize {
        self.index().map_or(0, |idx| SERVICE_STACK_SIZES[idx])
    }

    /// Every valid identity in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::NONE.0 + 1..Self::COUNT.0).map(Self)
    }

    /// Identities the lifecycle manager walks at startup: strictly between
    /// `SERVICE_MANAGER` and `COUNT`, without the reserved `LOG` slot.
    pub fn startup_order() -> impl Iterator<Item = Self> {
        (Self::SERVICE_MANAGER.0 + 1..Self::COUNT.0)
            .map(Self)
            .filter(|id| *id != Self::LOG)
    }

    /// Look an identity up by its canonical name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().find(|id| id.name().eq_ignore_ascii_case(name))
    }
}

impl Default for ServiceIdentity {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_bounds() {
        assert!(!ServiceIdentity::NONE.is_valid());
        assert!(!ServiceIdentity::COUNT.is_valid());
        assert!(!ServiceIdentity::from_raw(200).is_valid());
        assert!(ServiceIdentity::SERVICE_MANAGER.is_valid());
        assert!(ServiceIdentity::LOG.is_valid());
    }

    #[test]
    fn test_names_and_stack_sizes() {
        assert_eq!(ServiceIdentity::UI.name(), "UI");
        assert_eq!(ServiceIdentity::SERVICE_MANAGER.name(), "SRV_MNGR");
        assert_eq!(ServiceIdentity::NONE.name(), "NO_ID");
        assert_eq!(ServiceIdentity::COUNT.name(), "UNKNOWN");

        assert_eq!(ServiceIdentity::MATTER.stack_size(), 50 * 1024);
        assert_eq!(ServiceIdentity::MQTT.stack_size(), 20 * 1024);
        assert_eq!(ServiceIdentity::from_raw(42).stack_size(), 0);
    }

    #[test]
    fn test_startup_order_skips_manager_and_log() {
        let order: Vec<_> = ServiceIdentity::startup_order().collect();
        assert_eq!(
            order,
            vec![ServiceIdentity::UI, ServiceIdentity::MATTER, ServiceIdentity::MQTT]
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(ServiceIdentity::from_name("mqtt"), Some(ServiceIdentity::MQTT));
        assert_eq!(ServiceIdentity::from_name("srv_mngr"), Some(ServiceIdentity::SERVICE_MANAGER));
        assert_eq!(ServiceIdentity::from_name("toaster"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(ServiceIdentity::MATTER.to_string(), "3 (MATTER)");
    }
}
