//! Core domain types and service traits for the dispatch engine
//!
//! This module defines the alert model handed in by the upstream evaluator,
//! the channel configuration read from the config store, the per-channel
//! result handed back to callers, and the [`Transport`] contract that
//! performs the actual network delivery.

use crate::error::{FailureReason, NotifyError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Label or annotation set. Ordered so that hashing and rendering are stable.
pub type LabelSet = BTreeMap<String, String>;

/// State of a single alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Firing,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Firing => "firing",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed alert as handed over by the upstream evaluator.
///
/// Uses the Alertmanager field names on the wire (`startsAt`, `endsAt`,
/// `generatorURL`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifying labels.
    #[serde(default)]
    pub labels: LabelSet,
    /// Free-form descriptive annotations (summary, description, runbook...).
    #[serde(default)]
    pub annotations: LabelSet,
    pub status: AlertStatus,
    pub starts_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// Link back to the rule that produced the alert.
    #[serde(
        rename = "generatorURL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub generator_url: Option<String>,
}

impl Alert {
    /// Creates a firing alert with the given labels, started now.
    pub fn firing<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            status: AlertStatus::Firing,
            starts_at: Utc::now(),
            ..Default::default()
        }
    }

    /// Returns this alert marked resolved at `ends_at`.
    pub fn resolve_at(mut self, ends_at: DateTime<Utc>) -> Self {
        self.status = AlertStatus::Resolved;
        self.ends_at = Some(ends_at);
        self
    }

    /// A short stable identifier derived from the label set.
    pub fn fingerprint(&self) -> String {
        let hash = hash_labels(&self.labels);
        hash[..16].to_string()
    }
}

/// A non-empty group of alerts evaluated together for one notification
/// decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
    alerts: Vec<Alert>,
}

impl AlertBatch {
    /// Wraps `alerts` into a batch.
    ///
    /// # Errors
    /// Returns [`NotifyError::InvalidInput`] if `alerts` is empty.
    pub fn new(alerts: Vec<Alert>) -> Result<Self, NotifyError> {
        if alerts.is_empty() {
            return Err(NotifyError::InvalidInput(
                "alert batch must contain at least one alert".to_string(),
            ));
        }
        Ok(Self { alerts })
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    /// `Resolved` only when every alert in the batch is resolved.
    pub fn status(&self) -> AlertStatus {
        if self
            .alerts
            .iter()
            .all(|a| a.status == AlertStatus::Resolved)
        {
            AlertStatus::Resolved
        } else {
            AlertStatus::Firing
        }
    }

    pub fn firing(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Firing)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Resolved)
    }

    /// Labels present with the same value on every alert.
    pub fn common_labels(&self) -> LabelSet {
        common_pairs(self.alerts.iter().map(|a| &a.labels))
    }

    /// Annotations present with the same value on every alert.
    pub fn common_annotations(&self) -> LabelSet {
        common_pairs(self.alerts.iter().map(|a| &a.annotations))
    }

    /// Stable identifier of the alert group, derived from the common labels.
    ///
    /// Two batches for the same group hash to the same key regardless of
    /// the order or state of their members.
    pub fn group_key(&self) -> String {
        hash_labels(&self.common_labels())
    }
}

fn common_pairs<'a>(mut sets: impl Iterator<Item = &'a LabelSet>) -> LabelSet {
    let Some(first) = sets.next() else {
        return LabelSet::new();
    };
    let mut common = first.clone();
    for set in sets {
        common.retain(|k, v| set.get(k) == Some(v));
    }
    common
}

fn hash_labels(labels: &LabelSet) -> String {
    let data = labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");
    blake3::hash(data.as_bytes()).to_hex().to_string()
}

/// Persisted settings of one channel instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChannelConfig {
    /// Unique identity of the channel. Results are tagged with it.
    pub uid: String,
    /// Human-readable name, exposed to templates as `Receiver`.
    #[serde(default)]
    pub name: String,
    /// Provider kind tag (e.g. `"victorops"`, `"slack"`, `"webhook"`).
    pub kind: String,
    /// Endpoint the payload is delivered to.
    #[serde(default)]
    pub url: Option<String>,
    /// Suppress notifications for batches that are fully resolved.
    #[serde(default)]
    pub disable_resolve_message: bool,
    /// Provider-specific settings.
    #[serde(default)]
    pub settings: Map<String, Value>,
    /// Overrides the dispatcher's default delivery timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ChannelConfig {
    pub fn new(uid: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    /// Returns a non-empty string setting.
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Returns the endpoint URL or a configuration error naming the channel.
    pub fn require_url(&self) -> Result<&str, NotifyError> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                NotifyError::Configuration(format!(
                    "channel '{}' ({}) has no endpoint url",
                    self.uid, self.kind
                ))
            })
    }
}

/// Terminal state of one channel for one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Outcome {
    Delivered,
    Suppressed,
    Failed { reason: FailureReason, detail: String },
}

impl Outcome {
    pub fn failed(err: &NotifyError) -> Self {
        Outcome::Failed {
            reason: err.reason(),
            detail: err.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Delivered => "delivered",
            Outcome::Suppressed => "suppressed",
            Outcome::Failed { .. } => "failed",
        }
    }
}

/// Outcome of one dispatch attempt for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub channel_uid: String,
    pub channel_kind: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// Non-fatal template errors hit while building the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub render_errors: Vec<String>,
}

impl NotificationResult {
    pub fn new(config: &ChannelConfig, outcome: Outcome) -> Self {
        Self {
            channel_uid: config.uid.clone(),
            channel_kind: config.kind.clone(),
            outcome,
            timestamp: Utc::now(),
            render_errors: Vec::new(),
        }
    }

    /// True for delivered and intentionally suppressed channels.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed { .. })
    }

    /// The failure description, if the channel failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers an encoded payload to an external endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` to `url` once.
    ///
    /// # Returns
    /// * `Ok(())` when the endpoint accepted the payload
    /// * `Err` for network errors and non-success responses
    async fn send(&self, url: &str, body: &[u8], content_type: &str) -> Result<(), NotifyError>;
}
