//! Per-identity lifecycle state and the startup report.

use servicecore::ServiceIdentity;

/// Lifecycle state of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum ServiceState {
    #[default]
    Unregistered,
    Registered,
    Created,
    Started,
    CreateFailed,
    StartFailed,
}

impl ServiceState {
    /// States a startup pass leaves alone.
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            ServiceState::Started | ServiceState::CreateFailed | ServiceState::StartFailed
        )
    }
}

/// What one startup pass did with one identity.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub enum StartupOutcome {
    /// No factory registered
    Skipped,
    /// Created and task running
    Started,
    /// Left alone because an earlier pass already settled it
    Settled(ServiceState),
    /// Factory yielded nothing
    CreateFailed(String),
    /// Task could not be started, handle rolled back
    StartFailed(String),
}

impl StartupOutcome {
    /// Failures of this pass, and identities an earlier pass left failed.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StartupOutcome::CreateFailed(_)
                | StartupOutcome::StartFailed(_)
                | StartupOutcome::Settled(ServiceState::CreateFailed | ServiceState::StartFailed)
        )
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StartupEntry {
    pub identity: ServiceIdentity,
    pub name: String,
    pub outcome: StartupOutcome,
}

/// Outcomes of one startup pass, in processing order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StartupReport {
    entries: Vec<StartupEntry>,
}

impl StartupReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, identity: ServiceIdentity, outcome: StartupOutcome) {
        self.entries.push(StartupEntry {
            identity,
            name: identity.name().to_string(),
            outcome,
        });
    }

    pub fn entries(&self) -> &[StartupEntry] {
        &self.entries
    }

    pub fn outcome(&self, identity: ServiceIdentity) -> Option<&StartupOutcome> {
        self.entries
            .iter()
            .find(|e| e.identity == identity)
            .map(|e| &e.outcome)
    }

    /// Identity behind the aggregate startup error.
    pub fn first_failure(&self) -> Option<ServiceIdentity> {
        self.entries
            .iter()
            .find(|e| e.outcome.is_failure())
            .map(|e| e.identity)
    }

    pub fn failures(&self) -> Vec<ServiceIdentity> {
        self.filter(StartupOutcome::is_failure)
    }

    pub fn started(&self) -> Vec<ServiceIdentity> {
        self.filter(|o| *o == StartupOutcome::Started)
    }

    pub fn skipped(&self) -> Vec<ServiceIdentity> {
        self.filter(|o| *o == StartupOutcome::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.first_failure().is_none()
    }

    fn filter(&self, pred: impl Fn(&StartupOutcome) -> bool) -> Vec<ServiceIdentity> {
        self.entries
            .iter()
            .filter(|e| pred(&e.outcome))
            .map(|e| e.identity)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_failure_keeps_processing_order() {
        let mut report = StartupReport::new();
        report.record(ServiceIdentity::UI, StartupOutcome::Started);
        report.record(ServiceIdentity::MATTER, StartupOutcome::CreateFailed("empty".into()));
        report.record(ServiceIdentity::MQTT, StartupOutcome::StartFailed("spawn".into()));

        assert_eq!(report.first_failure(), Some(ServiceIdentity::MATTER));
        assert_eq!(
            report.failures(),
            vec![ServiceIdentity::MATTER, ServiceIdentity::MQTT]
        );
        assert_eq!(report.started(), vec![ServiceIdentity::UI]);
        assert!(!report.is_success());
    }

    #[test]
    fn test_skips_are_not_failures() {
        let mut report = StartupReport::new();
        report.record(ServiceIdentity::MATTER, StartupOutcome::Skipped);
        report.record(ServiceIdentity::MQTT, StartupOutcome::Settled(ServiceState::Started));

        assert!(report.is_success());
        assert_eq!(report.skipped(), vec![ServiceIdentity::MATTER]);
        assert_eq!(report.entries()[0].name, "MATTER");
        assert_eq!(
            report.outcome(ServiceIdentity::MQTT),
            Some(&StartupOutcome::Settled(ServiceState::Started))
        );
    }

    #[test]
    fn test_settled_failures_count_as_failures() {
        let mut report = StartupReport::new();
        report.record(ServiceIdentity::UI, StartupOutcome::Settled(ServiceState::Started));
        report.record(ServiceIdentity::MQTT, StartupOutcome::Settled(ServiceState::StartFailed));

        assert_eq!(report.first_failure(), Some(ServiceIdentity::MQTT));
        assert!(!report.is_success());
    }

    #[test]
    fn test_settled_states() {
        assert!(ServiceState::Started.is_settled());
        assert!(ServiceState::StartFailed.is_settled());
        assert!(!ServiceState::Registered.is_settled());
        assert!(!ServiceState::Created.is_settled());
    }

    #[test]
    fn test_report_serializes() {
        let mut report = StartupReport::new();
        report.record(ServiceIdentity::UI, StartupOutcome::Started);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["name"], "UI");
        assert_eq!(json["entries"][0]["outcome"], "Started");
    }
}
