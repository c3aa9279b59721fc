use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::alerts::AlertPolicy;
use crate::health::HealthFormulaKind;
use crate::parsing::{parse_duration_secs, parse_truthy};
use crate::types::Config;

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

/// Longest accepted `SWEEP_INTERVAL` / `STALE_THRESHOLD`: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 3600;

/// Non-empty trimmed value of `key`.
fn non_empty<E: EnvironmentProvider>(env: &E, key: &str) -> Option<String> {
    env.get_var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn duration_var<E: EnvironmentProvider>(env: &E, key: &str, default: u64) -> Result<u64> {
    let Some(raw) = non_empty(env, key) else {
        return Ok(default);
    };
    match parse_duration_secs(&raw) {
        Some(0) => Err(anyhow!("{} must be greater than zero", key)),
        Some(secs) if secs <= MAX_DURATION_SECS => Ok(secs),
        Some(secs) => Err(anyhow!(
            "{} is out of range: {}s (at most {}s)",
            key,
            secs,
            MAX_DURATION_SECS
        )),
        None => Err(anyhow!("Invalid {}: {:?} (expected e.g. 300, 90s, 5m, 1h)", key, raw)),
    }
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let registry_path = non_empty(env, "REGISTRY_PATH")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("REGISTRY_PATH env var must be set"))?;

    let sweep_interval_secs = duration_var(env, "SWEEP_INTERVAL", 300)?;
    let stale_threshold_secs = duration_var(env, "STALE_THRESHOLD", 300)?;
    let stale_threshold_secs = i64::try_from(stale_threshold_secs)
        .ok()
        .filter(|secs| chrono::Duration::try_seconds(*secs).is_some())
        .ok_or_else(|| anyhow!("STALE_THRESHOLD is out of range"))?;

    let health_formula = match non_empty(env, "HEALTH_FORMULA") {
        Some(v) => v
            .parse::<HealthFormulaKind>()
            .map_err(|e| anyhow!("Invalid HEALTH_FORMULA: {}", e))?,
        None => HealthFormulaKind::default(),
    };

    let alert_policy = match non_empty(env, "ALERT_POLICY") {
        Some(v) => v
            .parse::<AlertPolicy>()
            .map_err(|e| anyhow!("Invalid ALERT_POLICY: {}", e))?,
        None => AlertPolicy::default(),
    };

    let slack_webhook_url = non_empty(env, "SLACK_WEBHOOK_URL");
    let fleet_name = non_empty(env, "FLEET_NAME");

    let run_once = env
        .get_var("RUN_ONCE")
        .map(|v| parse_truthy(&v))
        .unwrap_or(false);

    Ok(Config {
        registry_path,
        sweep_interval_secs,
        stale_threshold_secs,
        health_formula,
        alert_policy,
        slack_webhook_url,
        fleet_name,
        run_once,
    })
}
