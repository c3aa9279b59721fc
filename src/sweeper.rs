use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::error::RegistryError;
use crate::registry::{ContainerRegistry, StatusGuard};
use crate::types::{ContainerRecord, ContainerState, ContainerStatus, StatusTransition};

pub const STALE_REASON: &str = "stale data detected";
pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 300;

/// A container that has never been seen counts as stale.
pub fn is_stale(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match last_seen {
        Some(seen) => now - seen > threshold,
        None => true,
    }
}

/// Transitions a sweep at `now` would make: every online container whose `last_seen`
/// is more than `stale_threshold` in the past goes offline. Offline containers and
/// fresh ones are left out, so applying the result and sweeping again yields nothing.
pub fn sweep_stale_containers(
    containers: &[ContainerRecord],
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> Vec<StatusTransition> {
    containers
        .iter()
        .filter(|c| c.status.state == ContainerState::Online)
        .filter(|c| is_stale(c.last_seen, now, stale_threshold))
        .map(|c| StatusTransition {
            id: c.device_id.clone(),
            new_status: ContainerStatus::offline(STALE_REASON, now),
            observed_last_seen: c.last_seen,
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct SweepOutcome {
    pub examined: usize,
    pub applied: Vec<StatusTransition>,
    /// Containers refreshed between the sweep's read and its write.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

/// Runs staleness sweeps against a registry.
pub struct StalenessSweeper<'a, R: ContainerRegistry + ?Sized> {
    registry: &'a R,
    stale_threshold: Duration,
}

impl<'a, R: ContainerRegistry + ?Sized> StalenessSweeper<'a, R> {
    pub fn new(registry: &'a R, stale_threshold: Duration) -> Self {
        Self {
            registry,
            stale_threshold,
        }
    }

    /// One sweep. If the container listing fails nothing is written and the error is
    /// returned; the next run repairs whatever this one missed.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<SweepOutcome, RegistryError> {
        let containers = self.registry.list_containers()?;
        let transitions = sweep_stale_containers(&containers, now, self.stale_threshold);

        let mut outcome = SweepOutcome {
            examined: containers.len(),
            ..Default::default()
        };

        for transition in transitions {
            // Only write if nothing refreshed the container since we listed it
            let guard = StatusGuard {
                state: ContainerState::Online,
                last_seen: transition.observed_last_seen,
            };
            match self
                .registry
                .update_status(&transition.id, transition.new_status.clone(), Some(guard))
            {
                Ok(true) => {
                    warn!(
                        "Container {} went offline: {} (last seen {})",
                        transition.id,
                        STALE_REASON,
                        transition
                            .observed_last_seen
                            .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
                            .unwrap_or_else(|| "never".to_string())
                    );
                    outcome.applied.push(transition);
                }
                Ok(false) => {
                    debug!("Container {} changed during sweep, skipping", transition.id);
                    outcome.skipped.push(transition.id);
                }
                Err(e) => {
                    error!("Failed to mark container {} offline: {}", transition.id, e);
                    outcome.failed.push(transition.id);
                }
            }
        }

        info!(
            "Staleness sweep: {} examined, {} went offline, {} skipped, {} failed",
            outcome.examined,
            outcome.applied.len(),
            outcome.skipped.len(),
            outcome.failed.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::InMemoryRegistry;
    use crate::types::{AlertEvent, AlertKey, AlertState, TelemetrySample, ThresholdConfig};

    fn threshold() -> Duration {
        Duration::seconds(DEFAULT_STALE_THRESHOLD_SECS)
    }

    fn record(id: &str, state: ContainerState, last_seen: Option<DateTime<Utc>>) -> ContainerRecord {
        let status = match state {
            ContainerState::Online => ContainerStatus::online(last_seen.unwrap_or_else(Utc::now)),
            ContainerState::Offline => ContainerStatus::offline("powered down", Utc::now()),
        };
        ContainerRecord {
            device_id: id.to_string(),
            status,
            last_seen,
            ..Default::default()
        }
    }

    #[test]
    fn test_is_stale_boundary() {
        let now = Utc::now();
        assert!(is_stale(Some(now - Duration::seconds(301)), now, threshold()));
        assert!(!is_stale(Some(now - Duration::seconds(300)), now, threshold()));
        assert!(!is_stale(Some(now - Duration::seconds(299)), now, threshold()));
        assert!(is_stale(None, now, threshold()));
    }

    #[test]
    fn test_sweep_boundary() {
        let now = Utc::now();
        let containers = vec![
            record("stale", ContainerState::Online, Some(now - Duration::seconds(5 * 60 + 1))),
            record("fresh", ContainerState::Online, Some(now - Duration::seconds(4 * 60 + 59))),
        ];
        let transitions = sweep_stale_containers(&containers, now, threshold());
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].id, "stale");
        assert_eq!(transitions[0].new_status.state, ContainerState::Offline);
        assert_eq!(transitions[0].new_status.reason.as_deref(), Some(STALE_REASON));
        assert_eq!(transitions[0].new_status.last_update, now);
    }

    #[test]
    fn test_sweep_skips_offline_and_flags_never_seen() {
        let now = Utc::now();
        let containers = vec![
            record("already-offline", ContainerState::Offline, Some(now - Duration::hours(3))),
            record("never-seen", ContainerState::Online, None),
        ];
        let transitions = sweep_stale_containers(&containers, now, threshold());
        let ids: Vec<_> = transitions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["never-seen"]);
    }

    #[test]
    fn test_sweep_is_pure() {
        let now = Utc::now();
        let containers = vec![
            record("a", ContainerState::Online, Some(now - Duration::minutes(10))),
            record("b", ContainerState::Online, Some(now)),
        ];
        let first = sweep_stale_containers(&containers, now, threshold());
        let second = sweep_stale_containers(&containers, now, threshold());
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_run_once_is_idempotent() {
        let now = Utc::now();
        let registry = InMemoryRegistry::with_containers(vec![
            record("a", ContainerState::Online, Some(now - Duration::minutes(10))),
            record("b", ContainerState::Online, Some(now - Duration::minutes(1))),
            record("c", ContainerState::Offline, Some(now - Duration::hours(1))),
        ]);
        let sweeper = StalenessSweeper::new(&registry, threshold());

        let first = sweeper.run_once(now).unwrap();
        assert_eq!(first.examined, 3);
        assert_eq!(first.applied.len(), 1);
        assert_eq!(first.applied[0].id, "a");
        assert!(first.skipped.is_empty());

        let second = sweeper.run_once(now).unwrap();
        assert!(second.applied.is_empty());
        assert!(second.skipped.is_empty());

        let a = registry.get_container("a").unwrap();
        assert_eq!(a.status, ContainerStatus::offline(STALE_REASON, now));
        assert!(registry.get_container("b").unwrap().is_online());
    }

    /// Delivers fresh telemetry for `racer` right after the sweep lists containers.
    struct RacingRegistry {
        inner: InMemoryRegistry,
        racer: String,
        arrival: DateTime<Utc>,
    }

    impl ContainerRegistry for RacingRegistry {
        fn get_container(&self, id: &str) -> Result<ContainerRecord, RegistryError> {
            self.inner.get_container(id)
        }
        fn list_containers(&self) -> Result<Vec<ContainerRecord>, RegistryError> {
            let listed = self.inner.list_containers()?;
            self.inner
                .record_telemetry(&self.racer, &TelemetrySample::default(), self.arrival)?;
            Ok(listed)
        }
        fn update_status(
            &self,
            id: &str,
            status: ContainerStatus,
            guard: Option<StatusGuard>,
        ) -> Result<bool, RegistryError> {
            self.inner.update_status(id, status, guard)
        }
        fn record_telemetry(
            &self,
            id: &str,
            sample: &TelemetrySample,
            now: DateTime<Utc>,
        ) -> Result<Option<ContainerState>, RegistryError> {
            self.inner.record_telemetry(id, sample, now)
        }
        fn append_alert(&self, id: &str, event: AlertEvent) -> Result<(), RegistryError> {
            self.inner.append_alert(id, event)
        }
        fn alerts(&self, id: &str) -> Result<Vec<AlertEvent>, RegistryError> {
            self.inner.alerts(id)
        }
        fn clear_alerts(&self, id: &str) -> Result<(), RegistryError> {
            self.inner.clear_alerts(id)
        }
        fn update_alert_state(&self, id: &str, state: AlertState) -> Result<(), RegistryError> {
            self.inner.update_alert_state(id, state)
        }
        fn resolve_alerts(&self, id: &str, keys: &[AlertKey]) -> Result<usize, RegistryError> {
            self.inner.resolve_alerts(id, keys)
        }
        fn update_thresholds(
            &self,
            id: &str,
            config: ThresholdConfig,
            food_type: Option<&str>,
            now: DateTime<Utc>,
        ) -> Result<(), RegistryError> {
            self.inner.update_thresholds(id, config, food_type, now)
        }
    }

    #[test]
    fn test_run_once_does_not_override_fresh_arrival() {
        let now = Utc::now();
        let registry = RacingRegistry {
            inner: InMemoryRegistry::with_containers(vec![
                record("racer", ContainerState::Online, Some(now - Duration::minutes(10))),
                record("quiet", ContainerState::Online, Some(now - Duration::minutes(10))),
            ]),
            racer: "racer".to_string(),
            arrival: now,
        };
        let sweeper = StalenessSweeper::new(&registry, threshold());

        let outcome = sweeper.run_once(now).unwrap();
        assert_eq!(outcome.skipped, vec!["racer".to_string()]);
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].id, "quiet");

        let racer = registry.get_container("racer").unwrap();
        assert!(racer.is_online());
        assert_eq!(racer.last_seen, Some(now));
    }

    #[test]
    fn test_run_once_aborts_when_listing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let registry = crate::registry::JsonFileRegistry::open(&path).unwrap();
        std::fs::write(&path, "[broken").unwrap();

        let sweeper = StalenessSweeper::new(&registry, threshold());
        let err = sweeper.run_once(Utc::now()).unwrap_err();
        assert!(matches!(err, RegistryError::Malformed(_)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[broken");
    }
}
