// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod error;
pub mod presets;
pub mod health;
pub mod alerts;
pub mod registry;
pub mod sweeper;
pub mod ingest;
pub mod collector;
pub mod report;
pub mod notify;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{parse_duration_secs, parse_timestamp, parse_truthy, format_duration_secs};
pub use error::RegistryError;
pub use presets::{find_food_type, FoodType, BUILTIN_FOOD_TYPES};
pub use health::{compute_health, GasFormula, HealthBand, HealthFormula, HealthFormulaKind, TemperatureFormula, HEALTHY};
pub use alerts::{evaluate_alerts, AlertDecision, AlertEvaluator, AlertPolicy};
pub use registry::{ContainerRegistry, InMemoryRegistry, JsonFileRegistry, StatusGuard};
pub use sweeper::{sweep_stale_containers, is_stale, StalenessSweeper, SweepOutcome, STALE_REASON};
pub use ingest::{IngestOutcome, TelemetryProcessor};
pub use collector::FleetCollector;
pub use report::{FleetReport, ReportSummary};
pub use notify::{build_slack_payload, send_to_slack};
