//! Generic JSON webhook.
//!
//! Sends the whole batch, not just the rendered text, so receivers can do
//! their own formatting.

use super::registry::{NotifierEnv, NotifierPlugin};
use super::{notify_on_resolve_default, Notifier, Payload};
use crate::core::{AlertStatus, ChannelConfig, LabelSet};
use crate::error::{NotifyError, Result};
use crate::summary::{AlertContext, Summary};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const KIND: &str = "webhook";

const PAYLOAD_VERSION: &str = "1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookAlert<'a> {
    status: AlertStatus,
    labels: &'a LabelSet,
    annotations: &'a LabelSet,
    starts_at: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    ends_at: &'a str,
    #[serde(rename = "generatorURL", skip_serializing_if = "is_blank")]
    generator_url: &'a str,
    fingerprint: &'a str,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

impl<'a> From<&'a AlertContext> for WebhookAlert<'a> {
    fn from(a: &'a AlertContext) -> Self {
        Self {
            status: a.status,
            labels: &a.labels,
            annotations: &a.annotations,
            starts_at: &a.starts_at,
            ends_at: &a.ends_at,
            generator_url: &a.generator_url,
            fingerprint: &a.fingerprint,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookBody<'a> {
    receiver: &'a str,
    status: AlertStatus,
    /// `alerting` or `ok`.
    state: &'a str,
    title: &'a str,
    message: &'a str,
    alerts: Vec<WebhookAlert<'a>>,
    truncated_alerts: usize,
    common_labels: &'a LabelSet,
    common_annotations: &'a LabelSet,
    group_key: &'a str,
    #[serde(rename = "externalURL")]
    external_url: &'a str,
    version: &'a str,
    timestamp: i64,
}

pub struct WebhookNotifier {
    url: String,
    /// Zero means no limit.
    max_alerts: usize,
}

impl WebhookNotifier {
    fn from_config(config: &ChannelConfig) -> Result<Self> {
        let url = config.require_url()?.to_string();

        if let Some(method) = config.setting_str("httpMethod") {
            if !method.eq_ignore_ascii_case("POST") {
                return Err(NotifyError::Configuration(format!(
                    "webhook channel '{}': unsupported httpMethod '{method}'",
                    config.uid
                )));
            }
        }

        let max_alerts = match config.settings.get("maxAlerts") {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                .ok_or_else(|| {
                    NotifyError::Configuration(format!(
                        "webhook channel '{}': maxAlerts must be a non-negative integer",
                        config.uid
                    ))
                })? as usize,
        };

        Ok(Self { url, max_alerts })
    }
}

impl Notifier for WebhookNotifier {
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
        let ctx = &summary.context;
        let total = ctx.alerts.len();
        let keep = if self.max_alerts == 0 {
            total
        } else {
            self.max_alerts.min(total)
        };

        let body = WebhookBody {
            receiver: &ctx.receiver,
            status: summary.status,
            state: match summary.status {
                AlertStatus::Firing => "alerting",
                AlertStatus::Resolved => "ok",
            },
            title: &summary.title,
            message: &summary.message,
            alerts: ctx.alerts[..keep].iter().map(WebhookAlert::from).collect(),
            truncated_alerts: total - keep,
            common_labels: &ctx.common_labels,
            common_annotations: &ctx.common_annotations,
            group_key: &ctx.group_key,
            external_url: &summary.external_url,
            version: PAYLOAD_VERSION,
            timestamp: now.timestamp(),
        };
        Payload::json(&body)
    }
}

// Plugin

pub struct WebhookPlugin;

impl NotifierPlugin for WebhookPlugin {
    fn kind(&self) -> &str {
        KIND
    }

    fn create(&self, config: &ChannelConfig, _env: &NotifierEnv) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(WebhookNotifier::from_config(config)?))
    }
}
