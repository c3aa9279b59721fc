use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::alerts::AlertPolicy;
use crate::health::{HealthBand, HealthFormulaKind};
use crate::parsing::parse_timestamp;
use crate::presets::find_food_type;

#[derive(Debug, Clone)]
pub struct Config {
    pub registry_path: PathBuf,
    pub sweep_interval_secs: u64,
    pub stale_threshold_secs: i64,
    pub health_formula: HealthFormulaKind,
    pub alert_policy: AlertPolicy,
    pub slack_webhook_url: Option<String>,
    pub fleet_name: Option<String>,
    pub run_once: bool,
}

impl Config {
    /// Saturates instead of panicking when built by hand with an out-of-range value;
    /// `load_config` never produces one.
    pub fn stale_threshold(&self) -> Duration {
        Duration::try_seconds(self.stale_threshold_secs).unwrap_or_else(Duration::max_value)
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub satellites: Option<u32>,
    #[serde(default)]
    pub fix: bool,
}

impl GpsFix {
    /// Latitude/longitude, only when the receiver reported a fix.
    pub fn position(&self) -> Option<(f64, f64)> {
        if !self.fix {
            return None;
        }
        match (finite(self.lat), finite(self.lon)) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// One reading as published by a container device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mq4_ppm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsFix>,
    #[serde(default)]
    pub timestamp: String,
}

impl TelemetrySample {
    pub fn temperature(&self) -> Option<f64> {
        finite(self.temperature_c)
    }

    pub fn humidity(&self) -> Option<f64> {
        finite(self.humidity_pct)
    }

    pub fn mq4(&self) -> Option<f64> {
        finite(self.mq4_ppm)
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Warn/critical pair for metrics that get worse as they rise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakpoints {
    #[serde(default)]
    pub warn: Option<f64>,
    #[serde(default)]
    pub critical: Option<f64>,
}

impl Breakpoints {
    pub fn warn(&self) -> Option<f64> {
        finite(self.warn)
    }

    pub fn critical(&self) -> Option<f64> {
        finite(self.critical)
    }

    pub fn pair(&self) -> Option<(f64, f64)> {
        Some((self.warn()?, self.critical()?))
    }

    fn overlay(&self, defaults: &Breakpoints) -> Breakpoints {
        Breakpoints {
            warn: self.warn.or(defaults.warn),
            critical: self.critical.or(defaults.critical),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HumidityBand {
    #[serde(default)]
    pub warn_low: Option<f64>,
    #[serde(default)]
    pub warn_high: Option<f64>,
}

impl HumidityBand {
    pub fn warn_low(&self) -> Option<f64> {
        finite(self.warn_low)
    }

    pub fn warn_high(&self) -> Option<f64> {
        finite(self.warn_high)
    }

    fn overlay(&self, defaults: &HumidityBand) -> HumidityBand {
        HumidityBand {
            warn_low: self.warn_low.or(defaults.warn_low),
            warn_high: self.warn_high.or(defaults.warn_high),
        }
    }
}

/// Per-container `threshold_overrides` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Breakpoints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<HumidityBand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mq4: Option<Breakpoints>,
}

impl ThresholdConfig {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.mq4.is_none()
    }

    /// Field-by-field merge: values set here win, gaps are filled from `defaults`.
    pub fn overlay(&self, defaults: &ThresholdConfig) -> ThresholdConfig {
        ThresholdConfig {
            temperature: merge(self.temperature, defaults.temperature, Breakpoints::overlay),
            humidity: merge(self.humidity, defaults.humidity, HumidityBand::overlay),
            mq4: merge(self.mq4, defaults.mq4, Breakpoints::overlay),
        }
    }

    /// Rejects non-finite breakpoints. Orderings such as `critical <= warn` are allowed.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("temperature.warn", self.temperature.and_then(|b| b.warn)),
            ("temperature.critical", self.temperature.and_then(|b| b.critical)),
            ("humidity.warn_low", self.humidity.and_then(|b| b.warn_low)),
            ("humidity.warn_high", self.humidity.and_then(|b| b.warn_high)),
            ("mq4.warn", self.mq4.and_then(|b| b.warn)),
            ("mq4.critical", self.mq4.and_then(|b| b.critical)),
        ];
        for (name, value) in fields {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(format!("{} must be a finite number, got {}", name, v));
                }
            }
        }
        Ok(())
    }
}

fn merge<T: Copy>(own: Option<T>, defaults: Option<T>, overlay: fn(&T, &T) -> T) -> Option<T> {
    match (own, defaults) {
        (Some(o), Some(d)) => Some(overlay(&o, &d)),
        (o, d) => o.or(d),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Temperature,
    Humidity,
    Mq4,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Temperature => write!(f, "temperature"),
            AlertKind::Humidity => write!(f, "humidity"),
            AlertKind::Mq4 => write!(f, "mq4"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warn,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warn => write!(f, "warn"),
            AlertLevel::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub level: AlertLevel,
}

impl fmt::Display for AlertKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set once the condition that raised this event has cleared.
    #[serde(default)]
    pub resolved: bool,
}

impl AlertEvent {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            kind: self.kind,
            level: self.level,
        }
    }
}

/// Keys that were breaching at a container's previous evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertState {
    active: BTreeSet<AlertKey>,
}

impl AlertState {
    pub fn from_events(events: &[AlertEvent]) -> Self {
        Self {
            active: events.iter().map(AlertEvent::key).collect(),
        }
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.active.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AlertKey> {
        self.active.iter()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Online,
    #[default]
    Offline,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerState::Online => write!(f, "online"),
            ContainerState::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub state: ContainerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub last_update: DateTime<Utc>,
}

impl ContainerStatus {
    pub fn online(at: DateTime<Utc>) -> Self {
        Self {
            state: ContainerState::Online,
            reason: None,
            last_update: at,
        }
    }

    pub fn offline(reason: &str, at: DateTime<Utc>) -> Self {
        Self {
            state: ContainerState::Offline,
            reason: Some(reason.to_string()),
            last_update: at,
        }
    }
}

/// The container document as the surrounding application stores it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_food_type: Option<String>,
    #[serde(default)]
    pub status: ContainerStatus,
    #[serde(default)]
    pub threshold_overrides: ThresholdConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_telemetry: Option<TelemetrySample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active_alerts: u32,
    #[serde(default, skip_serializing_if = "AlertState::is_empty")]
    pub alert_state: AlertState,
    /// When `threshold_overrides` or `selected_food_type` were last changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl ContainerRecord {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_online(&self) -> bool {
        self.status.state == ContainerState::Online
    }

    /// Overrides layered over the preset of the selected food type, if it is a known one.
    pub fn effective_thresholds(&self) -> ThresholdConfig {
        match self.selected_food_type.as_deref().and_then(find_food_type) {
            Some(preset) => self.threshold_overrides.overlay(&preset.thresholds),
            None => self.threshold_overrides.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTransition {
    pub id: String,
    pub new_status: ContainerStatus,
    #[serde(skip)]
    pub observed_last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ContainerHealth {
    pub device_id: String,
    pub food_type: Option<String>,
    pub state: ContainerState,
    pub health: u8,
    pub band: HealthBand,
    pub active_alerts: u32,
    pub last_seen: Option<DateTime<Utc>>,
    pub position: Option<(f64, f64)>,
}

#[derive(Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub blocks: Vec<serde_json::Value>,
}
