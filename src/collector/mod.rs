use crate::error::RegistryError;
use crate::health::{HealthBand, HealthFormula, HEALTHY};
use crate::registry::ContainerRegistry;
use crate::types::*;

/// Reads every container from the registry and scores it with the configured formula
pub struct FleetCollector<'a, R: ContainerRegistry + ?Sized> {
    registry: &'a R,
    config: &'a Config,
}

impl<'a, R: ContainerRegistry + ?Sized> FleetCollector<'a, R> {
    pub fn new(registry: &'a R, config: &'a Config) -> Self {
        Self { registry, config }
    }

    /// Current health of every container in the registry
    pub fn collect_container_health(&self) -> Result<Vec<ContainerHealth>, RegistryError> {
        let containers = self.registry.list_containers()?;
        Ok(containers.iter().map(|c| self.assess(c)).collect())
    }

    /// Score one container; no telemetry yet means healthy
    pub fn assess(&self, container: &ContainerRecord) -> ContainerHealth {
        let thresholds = container.effective_thresholds();
        let health = container
            .latest_telemetry
            .as_ref()
            .map(|sample| self.config.health_formula.score(sample, &thresholds))
            .unwrap_or(HEALTHY);
        let position = container
            .latest_telemetry
            .as_ref()
            .and_then(|s| s.gps.as_ref())
            .and_then(|g| g.position());

        ContainerHealth {
            device_id: container.device_id.clone(),
            food_type: container.selected_food_type.clone(),
            state: container.status.state,
            health,
            band: HealthBand::from_score(health),
            active_alerts: container.active_alerts,
            last_seen: container.last_seen,
            position,
        }
    }
}
