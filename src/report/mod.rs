use crate::health::HealthBand;
use crate::types::*;

/// Fleet state after one sweep cycle
pub struct FleetReport {
    pub config: Config,
    pub containers: Vec<ContainerHealth>,
    pub transitions: Vec<StatusTransition>,
}

impl FleetReport {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            containers: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn add_containers(&mut self, containers: Vec<ContainerHealth>) {
        self.containers.extend(containers);
    }

    pub fn set_transitions(&mut self, transitions: Vec<StatusTransition>) {
        self.transitions = transitions;
    }

    pub fn offline(&self) -> impl Iterator<Item = &ContainerHealth> {
        self.containers
            .iter()
            .filter(|c| c.state == ContainerState::Offline)
    }

    /// Online containers whose cargo is in the critical band
    pub fn at_risk(&self) -> impl Iterator<Item = &ContainerHealth> {
        self.containers
            .iter()
            .filter(|c| c.state == ContainerState::Online && c.band == HealthBand::Critical)
    }

    pub fn alerting(&self) -> impl Iterator<Item = &ContainerHealth> {
        self.containers.iter().filter(|c| c.active_alerts > 0)
    }

    /// Check if the report has any issues to report
    pub fn has_issues(&self) -> bool {
        !self.transitions.is_empty()
            || self.offline().next().is_some()
            || self.at_risk().next().is_some()
            || self.alerting().next().is_some()
    }

    /// Get a summary of the number of issues found
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            container_count: self.containers.len(),
            new_offline_count: self.transitions.len(),
            offline_count: self.offline().count(),
            at_risk_count: self.at_risk().count(),
            alerting_count: self.alerting().count(),
        }
    }
}

pub struct ReportSummary {
    pub container_count: usize,
    pub new_offline_count: usize,
    pub offline_count: usize,
    pub at_risk_count: usize,
    pub alerting_count: usize,
}

impl ReportSummary {
    /// Newly offline containers are already part of `offline_count`
    pub fn total_issues(&self) -> usize {
        self.offline_count + self.at_risk_count + self.alerting_count
    }

    pub fn has_issues(&self) -> bool {
        self.total_issues() > 0
    }
}
