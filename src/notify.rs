use anyhow::{anyhow, Context, Result};
use tracing::error;

use crate::parsing::format_duration_secs;
use crate::report::FleetReport;
use crate::types::{ContainerHealth, SlackPayload};

fn fmt_time(t: Option<chrono::DateTime<chrono::Utc>>) -> String {
    t.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| "never".to_string())
}

fn section(title: &str, mut lines: Vec<String>, empty: &str) -> serde_json::Value {
    if lines.is_empty() {
        lines.push(empty.to_string());
    }
    serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": format!("*{}*\n{}", title, lines.join("\n"))}
    })
}

fn food(c: &ContainerHealth) -> &str {
    c.food_type.as_deref().unwrap_or("unassigned")
}

pub fn build_slack_payload(report: &FleetReport) -> SlackPayload {
    let cfg = &report.config;
    let mut blocks: Vec<serde_json::Value> = Vec::new();
    let title = match &cfg.fleet_name {
        Some(name) => format!("Reefer Fleet Report - {}", name),
        None => "Reefer Fleet Report".to_string(),
    };
    blocks.push(serde_json::json!({
        "type": "header",
        "text": {"type": "plain_text", "text": title}
    }));

    let cfg_text = format!(
        "Containers: {}\nStale after: {}\nHealth formula: {}\nAlert policy: {}",
        report.containers.len(),
        format_duration_secs(cfg.stale_threshold_secs.max(0) as u64),
        cfg.health_formula,
        cfg.alert_policy,
    );
    blocks.push(serde_json::json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": cfg_text}
    }));

    // Transitions made by this sweep
    let went_offline: Vec<String> = report
        .transitions
        .iter()
        .map(|t| {
            format!(
                "• `{}` {} (last seen {})",
                t.id,
                t.new_status.reason.as_deref().unwrap_or("offline"),
                fmt_time(t.observed_last_seen)
            )
        })
        .collect();
    blocks.push(section("Went offline", went_offline, "No containers went offline."));

    let offline: Vec<String> = report
        .offline()
        .map(|c| format!("• `{}` ({}) last seen {}", c.device_id, food(c), fmt_time(c.last_seen)))
        .collect();
    blocks.push(section("Offline containers", offline, "All containers reporting."));

    let at_risk: Vec<String> = report
        .at_risk()
        .map(|c| {
            let pos = c
                .position
                .map(|(lat, lon)| format!(" at {:.4}, {:.4}", lat, lon))
                .unwrap_or_default();
            format!("• `{}` ({}) health {}%{}", c.device_id, food(c), c.health, pos)
        })
        .collect();
    blocks.push(section("At-risk cargo", at_risk, "No cargo in the critical band."));

    let alerting: Vec<String> = report
        .alerting()
        .map(|c| format!("• `{}` {} active alert(s), health {}% ({})", c.device_id, c.active_alerts, c.health, c.band))
        .collect();
    blocks.push(section("Active alerts", alerting, "No active alerts."));

    SlackPayload { text: None, blocks }
}

pub async fn send_to_slack(webhook_url: &str, payload: &SlackPayload) -> Result<()> {
    let client = reqwest::Client::new();
    let res = client
        .post(webhook_url)
        .json(payload)
        .send()
        .await
        .context("Failed to send Slack request")?;
    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!("Slack webhook failed: {} - {}", status, body);
        return Err(anyhow!("Slack webhook returned non-success status"));
    }
    Ok(())
}
