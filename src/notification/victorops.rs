//! VictorOps (Splunk On-Call) REST endpoint integration.
//!
//! Payload reference: the VictorOps "Alert Ingestion API". One incident per
//! alert group, keyed by `entity_id`.

use super::registry::{NotifierEnv, NotifierPlugin};
use super::{join_url, notify_on_resolve_default, Notifier, Payload, ALERT_LIST_PATH};
use crate::core::{AlertStatus, ChannelConfig};
use crate::error::Result;
use crate::summary::Summary;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const KIND: &str = "victorops";

/// Opens or updates the incident.
pub const MESSAGE_TYPE_CRITICAL: &str = "CRITICAL";
/// Closes the incident.
pub const MESSAGE_TYPE_RECOVERY: &str = "RECOVERY";

#[derive(Debug, Serialize)]
struct VictorOpsBody<'a> {
    message_type: &'a str,
    entity_id: &'a str,
    entity_display_name: &'a str,
    state_message: &'a str,
    timestamp: i64,
    monitoring_tool: &'a str,
    alert_url: String,
}

pub struct VictorOpsNotifier {
    url: String,
    monitoring_tool: String,
}

impl VictorOpsNotifier {
    pub fn new(url: impl Into<String>, monitoring_tool: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            monitoring_tool: monitoring_tool.into(),
        }
    }

    fn message_type(status: AlertStatus) -> &'static str {
        match status {
            AlertStatus::Firing => MESSAGE_TYPE_CRITICAL,
            AlertStatus::Resolved => MESSAGE_TYPE_RECOVERY,
        }
    }
}

impl Notifier for VictorOpsNotifier {
    fn kind(&self) -> &str {
        KIND
    }

    fn endpoint(&self) -> &str {
        &self.url
    }

    fn should_notify_on_resolve(&self, config: &ChannelConfig) -> bool {
        notify_on_resolve_default(config)
    }

    fn build_payload(
        &self,
        summary: &Summary,
        _config: &ChannelConfig,
        now: DateTime<Utc>,
    ) -> Result<Payload> {
        let body = VictorOpsBody {
            message_type: Self::message_type(summary.status),
            entity_id: summary.group_key(),
            entity_display_name: &summary.title,
            state_message: &summary.message,
            timestamp: now.timestamp(),
            monitoring_tool: &self.monitoring_tool,
            alert_url: join_url(&summary.external_url, ALERT_LIST_PATH),
        };
        Payload::json(&body)
    }
}

// Plugin

pub struct VictorOpsPlugin;

impl NotifierPlugin for VictorOpsPlugin {
    fn kind(&self) -> &str {
        KIND
    }

    fn create(&self, config: &ChannelConfig, env: &NotifierEnv) -> Result<Box<dyn Notifier>> {
        let url = config.require_url()?;
        Ok(Box::new(VictorOpsNotifier::new(url, env.monitoring_tool())))
    }
}
