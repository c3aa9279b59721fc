use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

use reefer_monitor::{
    build_slack_payload, load_config, send_to_slack, Config, FleetCollector, FleetReport,
    JsonFileRegistry, StalenessSweeper,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!(
        "registry = {}, sweep every {}s, stale after {}s, formula = {}, alerts = {}",
        cfg.registry_path.display(),
        cfg.sweep_interval_secs,
        cfg.stale_threshold_secs,
        cfg.health_formula,
        cfg.alert_policy
    );
    warn!("Containers without telemetry or thresholds are scored healthy (100)");

    let registry = JsonFileRegistry::open(&cfg.registry_path)
        .with_context(|| format!("Failed to open registry {}", cfg.registry_path.display()))?;

    if cfg.run_once {
        return run_cycle(&registry, &cfg).await;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(cfg.sweep_interval_secs));
    loop {
        interval.tick().await;
        // A failed cycle is retried on the next tick
        if let Err(e) = run_cycle(&registry, &cfg).await {
            error!("Sweep cycle failed: {:#}", e);
        }
    }
}

async fn run_cycle(registry: &JsonFileRegistry, cfg: &Config) -> Result<()> {
    let sweeper = StalenessSweeper::new(registry, cfg.stale_threshold());
    let outcome = sweeper.run_once(Utc::now()).context("Staleness sweep failed")?;

    let collector = FleetCollector::new(registry, cfg);
    let mut report = FleetReport::new(cfg.clone());
    report.add_containers(
        collector
            .collect_container_health()
            .context("Failed to collect container health")?,
    );
    report.set_transitions(outcome.applied);

    let summary = report.summary();
    info!(
        "Fleet report: {} containers, {} offline ({} new), {} at risk, {} alerting",
        summary.container_count,
        summary.offline_count,
        summary.new_offline_count,
        summary.at_risk_count,
        summary.alerting_count
    );

    // Notify only on transitions made by this sweep
    match &cfg.slack_webhook_url {
        Some(url) if summary.new_offline_count > 0 => {
            info!("Containers went offline, sending notification to Slack");
            let payload = build_slack_payload(&report);
            send_to_slack(url, &payload).await?;
        }
        Some(_) => info!("No new offline containers, skipping Slack notification"),
        None => {}
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
