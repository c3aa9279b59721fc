use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::alerts::{AlertEvaluator, AlertPolicy};
use crate::error::RegistryError;
use crate::health::{HealthBand, HealthFormula, HealthFormulaKind};
use crate::registry::ContainerRegistry;
use crate::types::{AlertEvent, AlertKey, Config, ContainerState, TelemetrySample};

/// What processing one sample did.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub device_id: String,
    pub health: u8,
    pub band: HealthBand,
    pub raised: Vec<AlertEvent>,
    pub resolved: Vec<AlertKey>,
    /// The container was offline or unknown before this sample.
    pub came_online: bool,
}

/// Handles a fresh telemetry arrival: the only writer besides the sweeper that changes
/// a container's state, and the only one that brings it back online.
pub struct TelemetryProcessor<'a, R: ContainerRegistry + ?Sized> {
    registry: &'a R,
    formula: HealthFormulaKind,
    alerts: AlertEvaluator,
}

impl<'a, R: ContainerRegistry + ?Sized> TelemetryProcessor<'a, R> {
    pub fn new(registry: &'a R, formula: HealthFormulaKind, policy: AlertPolicy) -> Self {
        Self {
            registry,
            formula,
            alerts: AlertEvaluator::new(policy),
        }
    }

    pub fn from_config(registry: &'a R, config: &Config) -> Self {
        Self::new(registry, config.health_formula, config.alert_policy)
    }

    pub fn process(
        &self,
        device_id: &str,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, RegistryError> {
        if !sample.timestamp.is_empty() && sample.recorded_at().is_none() {
            debug!("Container {} sent unparseable timestamp {:?}", device_id, sample.timestamp);
        }

        let previous = self.registry.record_telemetry(device_id, sample, now)?;
        if previous == Some(ContainerState::Offline) {
            info!("Container {} is back online", device_id);
        }

        let record = self.registry.get_container(device_id)?;
        let thresholds = record.effective_thresholds();
        let decision = self
            .alerts
            .evaluate(sample, &thresholds, &record.alert_state, now);

        for event in &decision.raised {
            info!("Container {} {} alert: {}", device_id, event.level, event.message);
            self.registry.append_alert(device_id, event.clone())?;
        }
        if !decision.resolved.is_empty() {
            let count = self.registry.resolve_alerts(device_id, &decision.resolved)?;
            let keys: Vec<String> = decision.resolved.iter().map(|k| k.to_string()).collect();
            debug!(
                "Container {} alerts resolved: {} ({} log entries)",
                device_id,
                keys.join(", "),
                count
            );
        }
        self.registry.update_alert_state(device_id, decision.state)?;

        let health = self.formula.score(sample, &thresholds);
        Ok(IngestOutcome {
            device_id: device_id.to_string(),
            health,
            band: HealthBand::from_score(health),
            raised: decision.raised,
            resolved: decision.resolved,
            came_online: previous != Some(ContainerState::Online),
        })
    }
}
