use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::RegistryError;
use crate::types::{
    AlertEvent, AlertKey, AlertState, ContainerRecord, ContainerState, ContainerStatus,
    TelemetrySample, ThresholdConfig,
};

/// Precondition for a status write: the write applies only while the container still
/// has this state and this `last_seen`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusGuard {
    pub state: ContainerState,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Per-container status/config store owned by the surrounding application.
pub trait ContainerRegistry {
    fn get_container(&self, id: &str) -> Result<ContainerRecord, RegistryError>;

    fn list_containers(&self) -> Result<Vec<ContainerRecord>, RegistryError>;

    /// Writes `status`. With a guard, returns `Ok(false)` and leaves the record untouched
    /// when the guard no longer holds.
    fn update_status(
        &self,
        id: &str,
        status: ContainerStatus,
        guard: Option<StatusGuard>,
    ) -> Result<bool, RegistryError>;

    /// Stores `sample` as the latest telemetry, stamps `last_seen = now` and marks the
    /// container online, registering it first if unknown. Returns the previous state.
    fn record_telemetry(
        &self,
        id: &str,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Result<Option<ContainerState>, RegistryError>;

    fn append_alert(&self, id: &str, event: AlertEvent) -> Result<(), RegistryError>;

    fn alerts(&self, id: &str) -> Result<Vec<AlertEvent>, RegistryError>;

    /// Empties the alert log, zeroes the active count and forgets the breach state, so
    /// a condition that persists is raised again on the next sample.
    fn clear_alerts(&self, id: &str) -> Result<(), RegistryError>;

    fn update_alert_state(&self, id: &str, state: AlertState) -> Result<(), RegistryError>;

    /// Marks every unresolved log entry matching one of `keys` as resolved and drops
    /// them from `active_alerts`. Returns how many entries were resolved.
    fn resolve_alerts(&self, id: &str, keys: &[AlertKey]) -> Result<usize, RegistryError>;

    /// Replaces `threshold_overrides` and stamps `last_modified = now`. The food type
    /// is changed only when one is given.
    fn update_thresholds(
        &self,
        id: &str,
        config: ThresholdConfig,
        food_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredContainer {
    #[serde(flatten)]
    record: ContainerRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    alerts: Vec<AlertEvent>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    containers: Vec<StoredContainer>,
}

/// Container documents keyed by device id; both registries apply their operations here.
#[derive(Debug, Default)]
struct ContainerTable {
    containers: BTreeMap<String, StoredContainer>,
}

impl ContainerTable {
    fn from_document(doc: RegistryDocument) -> Self {
        let containers = doc
            .containers
            .into_iter()
            .map(|c| (c.record.device_id.clone(), c))
            .collect();
        Self { containers }
    }

    fn to_document(&self) -> RegistryDocument {
        RegistryDocument {
            containers: self.containers.values().cloned().collect(),
        }
    }

    fn entry(&mut self, id: &str) -> Result<&mut StoredContainer, RegistryError> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn get(&self, id: &str) -> Result<ContainerRecord, RegistryError> {
        self.containers
            .get(id)
            .map(|c| c.record.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn list(&self) -> Vec<ContainerRecord> {
        self.containers.values().map(|c| c.record.clone()).collect()
    }

    fn insert(&mut self, record: ContainerRecord) {
        let alerts = self
            .containers
            .remove(&record.device_id)
            .map(|c| c.alerts)
            .unwrap_or_default();
        self.containers
            .insert(record.device_id.clone(), StoredContainer { record, alerts });
    }

    fn update_status(
        &mut self,
        id: &str,
        status: ContainerStatus,
        guard: Option<StatusGuard>,
    ) -> Result<bool, RegistryError> {
        let record = &mut self.entry(id)?.record;
        if let Some(g) = guard {
            if record.status.state != g.state || record.last_seen != g.last_seen {
                return Ok(false);
            }
        }
        record.status = status;
        Ok(true)
    }

    fn record_telemetry(
        &mut self,
        id: &str,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Option<ContainerState> {
        let previous = self.containers.get(id).map(|c| c.record.status.state);
        let stored = self
            .containers
            .entry(id.to_string())
            .or_insert_with(|| StoredContainer {
                record: ContainerRecord::new(id),
                alerts: Vec::new(),
            });
        stored.record.latest_telemetry = Some(sample.clone());
        stored.record.last_seen = Some(now);
        stored.record.status = ContainerStatus::online(now);
        previous
    }

    fn append_alert(&mut self, id: &str, event: AlertEvent) -> Result<(), RegistryError> {
        let stored = self.entry(id)?;
        stored.alerts.push(event);
        stored.record.active_alerts = stored.record.active_alerts.saturating_add(1);
        Ok(())
    }

    fn alerts(&self, id: &str) -> Result<Vec<AlertEvent>, RegistryError> {
        self.containers
            .get(id)
            .map(|c| c.alerts.clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn clear_alerts(&mut self, id: &str) -> Result<(), RegistryError> {
        let stored = self.entry(id)?;
        stored.alerts.clear();
        stored.record.active_alerts = 0;
        stored.record.alert_state = AlertState::default();
        Ok(())
    }

    fn update_alert_state(&mut self, id: &str, state: AlertState) -> Result<(), RegistryError> {
        self.entry(id)?.record.alert_state = state;
        Ok(())
    }

    fn resolve_alerts(&mut self, id: &str, keys: &[AlertKey]) -> Result<usize, RegistryError> {
        let stored = self.entry(id)?;
        let mut resolved = 0;
        for alert in stored.alerts.iter_mut() {
            if !alert.resolved && keys.contains(&alert.key()) {
                alert.resolved = true;
                resolved += 1;
            }
        }
        let resolved_count = u32::try_from(resolved).unwrap_or(u32::MAX);
        stored.record.active_alerts = stored.record.active_alerts.saturating_sub(resolved_count);
        Ok(resolved)
    }

    fn update_thresholds(
        &mut self,
        id: &str,
        config: ThresholdConfig,
        food_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        config.validate().map_err(RegistryError::InvalidThresholds)?;
        let record = &mut self.entry(id)?.record;
        record.threshold_overrides = config;
        if let Some(food) = food_type {
            record.selected_food_type = Some(food.to_string());
        }
        record.last_modified = Some(now);
        Ok(())
    }
}

/// Registry held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    table: Mutex<ContainerTable>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers<I>(containers: I) -> Self
    where
        I: IntoIterator<Item = ContainerRecord>,
    {
        let mut table = ContainerTable::default();
        for record in containers {
            table.insert(record);
        }
        Self {
            table: Mutex::new(table),
        }
    }

    /// Adds or replaces a container document, keeping its alert log.
    pub fn insert(&self, record: ContainerRecord) -> Result<(), RegistryError> {
        self.lock()?.insert(record);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ContainerTable>, RegistryError> {
        self.table
            .lock()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))
    }
}

impl ContainerRegistry for InMemoryRegistry {
    fn get_container(&self, id: &str) -> Result<ContainerRecord, RegistryError> {
        self.lock()?.get(id)
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>, RegistryError> {
        Ok(self.lock()?.list())
    }

    fn update_status(
        &self,
        id: &str,
        status: ContainerStatus,
        guard: Option<StatusGuard>,
    ) -> Result<bool, RegistryError> {
        self.lock()?.update_status(id, status, guard)
    }

    fn record_telemetry(
        &self,
        id: &str,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Result<Option<ContainerState>, RegistryError> {
        Ok(self.lock()?.record_telemetry(id, sample, now))
    }

    fn append_alert(&self, id: &str, event: AlertEvent) -> Result<(), RegistryError> {
        self.lock()?.append_alert(id, event)
    }

    fn alerts(&self, id: &str) -> Result<Vec<AlertEvent>, RegistryError> {
        self.lock()?.alerts(id)
    }

    fn clear_alerts(&self, id: &str) -> Result<(), RegistryError> {
        self.lock()?.clear_alerts(id)
    }

    fn update_alert_state(&self, id: &str, state: AlertState) -> Result<(), RegistryError> {
        self.lock()?.update_alert_state(id, state)
    }

    fn resolve_alerts(&self, id: &str, keys: &[AlertKey]) -> Result<usize, RegistryError> {
        self.lock()?.resolve_alerts(id, keys)
    }

    fn update_thresholds(
        &self,
        id: &str,
        config: ThresholdConfig,
        food_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.lock()?.update_thresholds(id, config, food_type, now)
    }
}

/// Registry backed by one JSON file of container documents:
/// `{"containers": [{"device_id": ..., "status": {...}, "alerts": [...]}, ...]}`.
///
/// Every operation re-reads the file; writes go to a sibling temp file that is renamed
/// into place, so a failed operation leaves the previous document intact.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileRegistry {
    /// Opens `path`, creating an empty registry file if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let registry = Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };
        if registry.path.exists() {
            let table = registry.load()?;
            info!(
                "Loaded {} container(s) from {}",
                table.containers.len(),
                registry.path.display()
            );
        } else {
            registry.save(&ContainerTable::default())?;
            info!("Created empty registry at {}", registry.path.display());
        }
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ContainerTable, RegistryError> {
        let raw = fs::read_to_string(&self.path)?;
        let doc: RegistryDocument = serde_json::from_str(&raw)?;
        Ok(ContainerTable::from_document(doc))
    }

    fn save(&self, table: &ContainerTable) -> Result<(), RegistryError> {
        let body = serde_json::to_string_pretty(&table.to_document())?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&ContainerTable) -> Result<T, RegistryError>) -> Result<T, RegistryError> {
        let _guard = self.guard()?;
        let table = self.load()?;
        f(&table)
    }

    fn modify<T>(
        &self,
        f: impl FnOnce(&mut ContainerTable) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let _guard = self.guard()?;
        let mut table = self.load()?;
        let out = f(&mut table)?;
        self.save(&table)?;
        Ok(out)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, RegistryError> {
        self.lock
            .lock()
            .map_err(|_| RegistryError::Unavailable("registry lock poisoned".to_string()))
    }
}

impl ContainerRegistry for JsonFileRegistry {
    fn get_container(&self, id: &str) -> Result<ContainerRecord, RegistryError> {
        self.read(|t| t.get(id))
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>, RegistryError> {
        self.read(|t| Ok(t.list()))
    }

    fn update_status(
        &self,
        id: &str,
        status: ContainerStatus,
        guard: Option<StatusGuard>,
    ) -> Result<bool, RegistryError> {
        self.modify(|t| t.update_status(id, status, guard))
    }

    fn record_telemetry(
        &self,
        id: &str,
        sample: &TelemetrySample,
        now: DateTime<Utc>,
    ) -> Result<Option<ContainerState>, RegistryError> {
        self.modify(|t| Ok(t.record_telemetry(id, sample, now)))
    }

    fn append_alert(&self, id: &str, event: AlertEvent) -> Result<(), RegistryError> {
        self.modify(|t| t.append_alert(id, event))
    }

    fn alerts(&self, id: &str) -> Result<Vec<AlertEvent>, RegistryError> {
        self.read(|t| t.alerts(id))
    }

    fn clear_alerts(&self, id: &str) -> Result<(), RegistryError> {
        self.modify(|t| t.clear_alerts(id))
    }

    fn update_alert_state(&self, id: &str, state: AlertState) -> Result<(), RegistryError> {
        self.modify(|t| t.update_alert_state(id, state))
    }

    fn resolve_alerts(&self, id: &str, keys: &[AlertKey]) -> Result<usize, RegistryError> {
        self.modify(|t| t.resolve_alerts(id, keys))
    }

    fn update_thresholds(
        &self,
        id: &str,
        config: ThresholdConfig,
        food_type: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.modify(|t| t.update_thresholds(id, config, food_type, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertKind, AlertLevel, Breakpoints};
    use chrono::Duration;

    fn online_record(id: &str, last_seen: DateTime<Utc>) -> ContainerRecord {
        ContainerRecord {
            device_id: id.to_string(),
            status: ContainerStatus::online(last_seen),
            last_seen: Some(last_seen),
            ..Default::default()
        }
    }

    fn alert(level: AlertLevel) -> AlertEvent {
        AlertEvent {
            kind: AlertKind::Mq4,
            level,
            message: "gas".to_string(),
            timestamp: Utc::now(),
            resolved: false,
        }
    }

    #[test]
    fn test_guarded_status_update() {
        let seen = Utc::now() - Duration::minutes(10);
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", seen)]);
        let offline = ContainerStatus::offline("stale data detected", Utc::now());

        // Guard no longer holds: last_seen moved on
        let stale_guard = StatusGuard {
            state: ContainerState::Online,
            last_seen: Some(seen - Duration::minutes(1)),
        };
        assert!(!registry.update_status("c-1", offline.clone(), Some(stale_guard)).unwrap());
        assert!(registry.get_container("c-1").unwrap().is_online());

        let guard = StatusGuard { state: ContainerState::Online, last_seen: Some(seen) };
        assert!(registry.update_status("c-1", offline.clone(), Some(guard)).unwrap());
        let record = registry.get_container("c-1").unwrap();
        assert_eq!(record.status, offline);

        // Second guarded write sees offline and is a no-op
        assert!(!registry.update_status("c-1", offline, Some(guard)).unwrap());
    }

    #[test]
    fn test_unguarded_status_update() {
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", Utc::now())]);
        let offline = ContainerStatus::offline("maintenance", Utc::now());
        assert!(registry.update_status("c-1", offline, None).unwrap());
        assert!(!registry.get_container("c-1").unwrap().is_online());
    }

    #[test]
    fn test_unknown_container() {
        let registry = InMemoryRegistry::new();
        assert!(matches!(registry.get_container("nope"), Err(RegistryError::NotFound(id)) if id == "nope"));
        assert!(matches!(registry.clear_alerts("nope"), Err(RegistryError::NotFound(_))));
        assert!(matches!(
            registry.update_status("nope", ContainerStatus::online(Utc::now()), None),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_telemetry_registers_and_marks_online() {
        let registry = InMemoryRegistry::new();
        let now = Utc::now();
        let sample = TelemetrySample { mq4_ppm: Some(12.0), ..Default::default() };

        assert_eq!(registry.record_telemetry("c-9", &sample, now).unwrap(), None);
        let record = registry.get_container("c-9").unwrap();
        assert!(record.is_online());
        assert_eq!(record.last_seen, Some(now));
        assert_eq!(record.latest_telemetry, Some(sample.clone()));

        registry
            .update_status("c-9", ContainerStatus::offline("stale data detected", now), None)
            .unwrap();
        let later = now + Duration::minutes(7);
        assert_eq!(
            registry.record_telemetry("c-9", &sample, later).unwrap(),
            Some(ContainerState::Offline)
        );
        let record = registry.get_container("c-9").unwrap();
        assert_eq!(record.status, ContainerStatus::online(later));
    }

    #[test]
    fn test_alert_log_and_clear() {
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", Utc::now())]);
        registry.append_alert("c-1", alert(AlertLevel::Warn)).unwrap();
        registry.append_alert("c-1", alert(AlertLevel::Critical)).unwrap();
        let state = AlertState::from_events(&[alert(AlertLevel::Critical)]);
        registry.update_alert_state("c-1", state.clone()).unwrap();

        let record = registry.get_container("c-1").unwrap();
        assert_eq!(record.active_alerts, 2);
        assert_eq!(record.alert_state, state);
        assert_eq!(registry.alerts("c-1").unwrap().len(), 2);

        registry.clear_alerts("c-1").unwrap();
        let record = registry.get_container("c-1").unwrap();
        assert_eq!(record.active_alerts, 0);
        assert!(record.alert_state.is_empty());
        assert!(registry.alerts("c-1").unwrap().is_empty());
    }

    #[test]
    fn test_update_thresholds_validates() {
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", Utc::now())]);
        let good = ThresholdConfig {
            mq4: Some(Breakpoints { warn: Some(50.0), critical: Some(150.0) }),
            ..Default::default()
        };
        let now = Utc::now();
        registry.update_thresholds("c-1", good.clone(), None, now).unwrap();
        let record = registry.get_container("c-1").unwrap();
        assert_eq!(record.threshold_overrides, good);
        assert_eq!(record.last_modified, Some(now));

        let bad = ThresholdConfig {
            mq4: Some(Breakpoints { warn: Some(f64::INFINITY), critical: Some(150.0) }),
            ..Default::default()
        };
        let later = now + Duration::minutes(1);
        let err = registry
            .update_thresholds("c-1", bad, Some("chicken"), later)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidThresholds(_)));
        let record = registry.get_container("c-1").unwrap();
        assert_eq!(record.threshold_overrides, good);
        assert_eq!(record.selected_food_type, None);
        assert_eq!(record.last_modified, Some(now));
    }

    #[test]
    fn test_resolve_alerts_marks_matching_entries() {
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", Utc::now())]);
        registry.append_alert("c-1", alert(AlertLevel::Warn)).unwrap();
        registry.append_alert("c-1", alert(AlertLevel::Critical)).unwrap();
        registry.append_alert("c-1", alert(AlertLevel::Critical)).unwrap();

        let critical = alert(AlertLevel::Critical).key();
        assert_eq!(registry.resolve_alerts("c-1", &[critical]).unwrap(), 2);
        assert_eq!(registry.get_container("c-1").unwrap().active_alerts, 1);

        let log = registry.alerts("c-1").unwrap();
        assert_eq!(log.len(), 3);
        assert!(!log[0].resolved);
        assert!(log[1].resolved && log[2].resolved);

        // Already resolved entries are not counted twice
        assert_eq!(registry.resolve_alerts("c-1", &[critical]).unwrap(), 0);
        assert_eq!(registry.get_container("c-1").unwrap().active_alerts, 1);
        assert!(matches!(registry.resolve_alerts("nope", &[critical]), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn test_json_file_registry_updates_food_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let registry = JsonFileRegistry::open(&path).unwrap();
        let now = Utc::now();
        registry
            .record_telemetry("RC-5", &TelemetrySample::default(), now)
            .unwrap();

        let overrides = ThresholdConfig {
            temperature: Some(Breakpoints { warn: None, critical: Some(6.0) }),
            ..Default::default()
        };
        registry
            .update_thresholds("RC-5", overrides.clone(), Some("chicken"), now)
            .unwrap();

        // Without a food type the previous one is kept
        let later = now + Duration::minutes(5);
        registry
            .update_thresholds("RC-5", overrides.clone(), None, later)
            .unwrap();

        let reopened = JsonFileRegistry::open(&path).unwrap();
        let record = reopened.get_container("RC-5").unwrap();
        assert_eq!(record.selected_food_type.as_deref(), Some("chicken"));
        assert_eq!(record.last_modified, Some(later));
        let effective = record.effective_thresholds();
        assert_eq!(effective.temperature.unwrap().pair(), Some((2.0, 6.0)));
    }

    #[test]
    fn test_json_file_registry_tolerates_missing_last_update() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"containers": [
                {"device_id": "RC-1", "status": {"state": "online"}},
                {"device_id": "RC-2", "status": {"state": "offline", "reason": "powered down", "last_update": "2025-03-01T09:00:00Z"}}
            ]}"#,
        )
        .unwrap();

        let registry = JsonFileRegistry::open(&path).unwrap();
        let containers = registry.list_containers().unwrap();
        assert_eq!(containers.len(), 2);
        assert!(registry.get_container("RC-1").unwrap().is_online());
    }

    #[test]
    fn test_insert_keeps_alert_log() {
        let registry = InMemoryRegistry::with_containers(vec![online_record("c-1", Utc::now())]);
        registry.append_alert("c-1", alert(AlertLevel::Warn)).unwrap();

        let mut replacement = registry.get_container("c-1").unwrap();
        replacement.selected_food_type = Some("bananas".to_string());
        registry.insert(replacement).unwrap();

        assert_eq!(registry.alerts("c-1").unwrap().len(), 1);
        assert_eq!(
            registry.get_container("c-1").unwrap().selected_food_type.as_deref(),
            Some("bananas")
        );
    }

    #[test]
    fn test_json_file_registry_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");

        let registry = JsonFileRegistry::open(&path).unwrap();
        assert!(path.exists());
        assert!(registry.list_containers().unwrap().is_empty());

        let now = Utc::now();
        let sample = TelemetrySample { temperature_c: Some(3.0), ..Default::default() };
        registry.record_telemetry("RC-7", &sample, now).unwrap();
        registry.append_alert("RC-7", alert(AlertLevel::Warn)).unwrap();

        // A second handle sees the persisted state
        let reopened = JsonFileRegistry::open(&path).unwrap();
        let record = reopened.get_container("RC-7").unwrap();
        assert!(record.is_online());
        assert_eq!(record.active_alerts, 1);
        assert_eq!(reopened.alerts("RC-7").unwrap().len(), 1);

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let doc = &raw["containers"][0];
        assert_eq!(doc["device_id"], "RC-7");
        assert_eq!(doc["status"]["state"], "online");
        assert_eq!(doc["latest_telemetry"]["temperature_c"], 3.0);
        assert_eq!(doc["alerts"][0]["type"], "mq4");
    }

    #[test]
    fn test_json_file_registry_malformed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(JsonFileRegistry::open(&path), Err(RegistryError::Malformed(_))));
    }

    #[test]
    fn test_json_file_registry_failed_operation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let registry = JsonFileRegistry::open(&path).unwrap();
        registry
            .record_telemetry("RC-1", &TelemetrySample::default(), Utc::now())
            .unwrap();
        let before = fs::read_to_string(&path).unwrap();

        assert!(registry.append_alert("missing", alert(AlertLevel::Warn)).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }
}
