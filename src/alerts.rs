use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{
    AlertEvent, AlertKey, AlertKind, AlertLevel, AlertState, Breakpoints, TelemetrySample,
    ThresholdConfig,
};

/// Compares one sample against its thresholds and returns every breach, at most one
/// per dimension. Dimensions with no thresholds or no reading never emit.
///
/// Temperature must exceed a breakpoint to breach it; gas breaches once it reaches one.
pub fn evaluate_alerts(
    sample: &TelemetrySample,
    thresholds: &ThresholdConfig,
    now: DateTime<Utc>,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    if let (Some(temp), Some(bp)) = (sample.temperature(), thresholds.temperature.as_ref()) {
        if let Some(level) = rising_level(temp, bp, Edge::Exclusive) {
            let message = match level {
                AlertLevel::Critical => format!("Critical temperature: {}°C", temp),
                AlertLevel::Warn => format!("High temperature: {}°C", temp),
            };
            events.push(event(AlertKind::Temperature, level, message, now));
        }
    }

    if let (Some(humidity), Some(band)) = (sample.humidity(), thresholds.humidity.as_ref()) {
        if band.warn_high().map_or(false, |high| humidity > high) {
            let message = format!("High humidity: {}%", humidity);
            events.push(event(AlertKind::Humidity, AlertLevel::Warn, message, now));
        } else if band.warn_low().map_or(false, |low| humidity < low) {
            let message = format!("Low humidity: {}%", humidity);
            events.push(event(AlertKind::Humidity, AlertLevel::Warn, message, now));
        }
    }

    if let (Some(ppm), Some(bp)) = (sample.mq4(), thresholds.mq4.as_ref()) {
        if let Some(level) = rising_level(ppm, bp, Edge::Inclusive) {
            let message = match level {
                AlertLevel::Critical => format!("Critical gas level: {} ppm", ppm),
                AlertLevel::Warn => format!("Elevated gas level: {} ppm", ppm),
            };
            events.push(event(AlertKind::Mq4, level, message, now));
        }
    }

    events
}

#[derive(Clone, Copy)]
enum Edge {
    Inclusive,
    Exclusive,
}

impl Edge {
    fn breached(self, value: f64, breakpoint: f64) -> bool {
        match self {
            Edge::Inclusive => value >= breakpoint,
            Edge::Exclusive => value > breakpoint,
        }
    }
}

fn rising_level(value: f64, bp: &Breakpoints, edge: Edge) -> Option<AlertLevel> {
    if bp.critical().map_or(false, |c| edge.breached(value, c)) {
        return Some(AlertLevel::Critical);
    }
    if bp.warn().map_or(false, |w| edge.breached(value, w)) {
        return Some(AlertLevel::Warn);
    }
    None
}

fn event(kind: AlertKind, level: AlertLevel, message: String, now: DateTime<Utc>) -> AlertEvent {
    AlertEvent {
        kind,
        level,
        message,
        timestamp: now,
        resolved: false,
    }
}

/// How repeated breaches across consecutive samples are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Raise every breach on every sample.
    EverySample,
    /// Raise a breach only when its (type, level) was not breaching on the previous sample.
    #[default]
    OnChange,
}

impl FromStr for AlertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "every_sample" => Ok(AlertPolicy::EverySample),
            "on_change" => Ok(AlertPolicy::OnChange),
            other => Err(format!("unknown alert policy {:?} (expected on_change or every_sample)", other)),
        }
    }
}

impl fmt::Display for AlertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertPolicy::EverySample => write!(f, "every_sample"),
            AlertPolicy::OnChange => write!(f, "on_change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertDecision {
    /// Events to append to the container's alert log.
    pub raised: Vec<AlertEvent>,
    /// Keys that were breaching before and are not any more.
    pub resolved: Vec<AlertKey>,
    /// State to carry into the next evaluation.
    pub state: AlertState,
}

/// Stateless evaluation plus the configured deduplication policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlertEvaluator {
    policy: AlertPolicy,
}

impl AlertEvaluator {
    pub fn new(policy: AlertPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn evaluate(
        &self,
        sample: &TelemetrySample,
        thresholds: &ThresholdConfig,
        previous: &AlertState,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let events = evaluate_alerts(sample, thresholds, now);
        let state = AlertState::from_events(&events);
        let resolved = previous
            .keys()
            .filter(|key| !state.contains(key))
            .copied()
            .collect();
        let raised = match self.policy {
            AlertPolicy::EverySample => events,
            AlertPolicy::OnChange => events
                .into_iter()
                .filter(|e| !previous.contains(&e.key()))
                .collect(),
        };

        AlertDecision {
            raised,
            resolved,
            state,
        }
    }
}
