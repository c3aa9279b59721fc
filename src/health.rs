//! Health scoring.
//!
//! A score is an integer in `0..=100`, recomputed from the latest sample and the
//! current thresholds every time it is needed. Whenever the governing reading or its
//! breakpoints are missing the score is [`HEALTHY`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{TelemetrySample, ThresholdConfig};

pub const HEALTHY: u8 = 100;

/// Width of the band below `warn` that the temperature formula spreads 51..100 across.
const TEMPERATURE_SAFE_BAND_C: f64 = 5.0;

/// Reduces one sample plus thresholds to a health score.
pub trait HealthFormula {
    fn score(&self, sample: &TelemetrySample, thresholds: &ThresholdConfig) -> u8;
}

/// Scores gas concentration (`mq4_ppm`) against `thresholds.mq4`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GasFormula;

impl HealthFormula for GasFormula {
    fn score(&self, sample: &TelemetrySample, thresholds: &ThresholdConfig) -> u8 {
        let Some((warn, critical)) = thresholds.mq4.and_then(|b| b.pair()) else {
            return HEALTHY;
        };
        match sample.mq4() {
            Some(ppm) => gas_score(ppm, warn, critical),
            None => HEALTHY,
        }
    }
}

/// Legacy scoring on `temperature_c` against `thresholds.temperature`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemperatureFormula;

impl HealthFormula for TemperatureFormula {
    fn score(&self, sample: &TelemetrySample, thresholds: &ThresholdConfig) -> u8 {
        let Some(bp) = thresholds.temperature else {
            return HEALTHY;
        };
        match (sample.temperature(), bp.warn()) {
            (Some(temp), Some(warn)) => temperature_score(temp, warn, bp.critical()),
            _ => HEALTHY,
        }
    }
}

pub fn gas_score(ppm: f64, warn: f64, critical: f64) -> u8 {
    if ppm <= 0.0 {
        return HEALTHY;
    }
    let range = critical - warn;
    if range <= 0.0 && ppm >= warn {
        return 0;
    }
    if ppm >= critical {
        return 0;
    }
    if ppm < warn {
        // ppm > 0 here, so warn > 0
        return to_score((100.0 - (ppm / warn) * 50.0).max(50.0));
    }
    to_score((50.0 - ((ppm - warn) / range) * 50.0).max(0.0))
}

pub fn temperature_score(temp: f64, warn: f64, critical: Option<f64>) -> u8 {
    if critical.map_or(false, |c| temp >= c) {
        return 25;
    }
    if temp >= warn {
        return 50;
    }
    let scaled = (warn - temp) / TEMPERATURE_SAFE_BAND_C * 49.0 + 51.0;
    to_score(scaled.max(51.0).min(100.0))
}

fn to_score(v: f64) -> u8 {
    v.round().clamp(0.0, 100.0) as u8
}

/// Health of a sample under the gas formula.
pub fn compute_health(sample: &TelemetrySample, thresholds: &ThresholdConfig) -> u8 {
    GasFormula.score(sample, thresholds)
}

/// Which formula governs a deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthFormulaKind {
    #[default]
    Gas,
    Temperature,
}

impl HealthFormula for HealthFormulaKind {
    fn score(&self, sample: &TelemetrySample, thresholds: &ThresholdConfig) -> u8 {
        match self {
            HealthFormulaKind::Gas => GasFormula.score(sample, thresholds),
            HealthFormulaKind::Temperature => TemperatureFormula.score(sample, thresholds),
        }
    }
}

impl FromStr for HealthFormulaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gas" | "mq4" => Ok(HealthFormulaKind::Gas),
            "temperature" | "temp" => Ok(HealthFormulaKind::Temperature),
            other => Err(format!("unknown health formula {:?} (expected gas or temperature)", other)),
        }
    }
}

impl fmt::Display for HealthFormulaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthFormulaKind::Gas => write!(f, "gas"),
            HealthFormulaKind::Temperature => write!(f, "temperature"),
        }
    }
}

/// Display bucket for a score, matching the dashboard meter colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthBand {
    Good,
    Warning,
    Critical,
}

impl HealthBand {
    pub fn from_score(score: u8) -> Self {
        if score > 75 {
            HealthBand::Good
        } else if score > 40 {
            HealthBand::Warning
        } else {
            HealthBand::Critical
        }
    }
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Good => write!(f, "good"),
            HealthBand::Warning => write!(f, "warning"),
            HealthBand::Critical => write!(f, "critical"),
        }
    }
}
