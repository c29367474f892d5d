//! Aggregation of an alert batch into one notification decision.
//!
//! The [`Summarizer`] derives the batch status and renders the shared title
//! and message. Rendering problems never abort the batch: the field is left
//! empty and the error is kept on the [`Summary`] for the caller to log.

use crate::core::{Alert, AlertBatch, AlertStatus, LabelSet};
use crate::error::NotifyError;
use crate::template::TemplateSet;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub const TITLE_TEMPLATE: &str = "default.title";
pub const MESSAGE_TEMPLATE: &str = "default.message";

/// One alert as seen by templates.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AlertContext {
    pub status: AlertStatus,
    pub labels: LabelSet,
    pub annotations: LabelSet,
    /// `key = value` lines, in key order.
    pub label_pairs: Vec<String>,
    pub annotation_pairs: Vec<String>,
    pub starts_at: String,
    /// Empty while the alert is firing.
    pub ends_at: String,
    #[serde(rename = "GeneratorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

impl From<&Alert> for AlertContext {
    fn from(alert: &Alert) -> Self {
        Self {
            status: alert.status,
            labels: alert.labels.clone(),
            annotations: alert.annotations.clone(),
            label_pairs: pairs(&alert.labels),
            annotation_pairs: pairs(&alert.annotations),
            starts_at: alert.starts_at.to_rfc3339(),
            ends_at: alert.ends_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            generator_url: alert.generator_url.clone().unwrap_or_default(),
            fingerprint: alert.fingerprint(),
        }
    }
}

fn pairs(set: &LabelSet) -> Vec<String> {
    set.iter().map(|(k, v)| format!("{k} = {v}")).collect()
}

/// Read-only view of a batch handed to templates. Lives for one dispatch.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TemplateContext {
    pub receiver: String,
    pub status: AlertStatus,
    pub alerts: Vec<AlertContext>,
    pub firing_alerts: Vec<AlertContext>,
    pub resolved_alerts: Vec<AlertContext>,
    pub common_labels: LabelSet,
    pub common_annotations: LabelSet,
    pub group_key: String,
    #[serde(rename = "ExternalURL")]
    pub external_url: String,
}

impl TemplateContext {
    pub fn new(batch: &AlertBatch, receiver: &str, external_url: &str) -> Self {
        let alerts: Vec<AlertContext> = batch.alerts().iter().map(AlertContext::from).collect();
        let (firing_alerts, resolved_alerts): (Vec<_>, Vec<_>) = alerts
            .iter()
            .cloned()
            .partition(|a| a.status == AlertStatus::Firing);
        Self {
            receiver: receiver.to_string(),
            status: batch.status(),
            alerts,
            firing_alerts,
            resolved_alerts,
            common_labels: batch.common_labels(),
            common_annotations: batch.common_annotations(),
            group_key: batch.group_key(),
            external_url: external_url.to_string(),
        }
    }
}

/// Everything a notifier needs to build its payload.
#[derive(Debug, Clone)]
pub struct Summary {
    pub status: AlertStatus,
    pub title: String,
    pub message: String,
    pub external_url: String,
    pub context: TemplateContext,
    /// `context` as the JSON value templates are rendered against.
    pub context_value: Value,
    /// Non-fatal errors from rendering the fields above.
    pub render_errors: Vec<NotifyError>,
}

impl Summary {
    /// Renders `name` against this summary's context, degrading to an empty
    /// string on error. The error is logged and returned alongside.
    pub fn render_or_empty(
        &self,
        templates: &TemplateSet,
        name: &str,
    ) -> (String, Option<NotifyError>) {
        match templates.render(name, &self.context_value) {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(template = name, error = %e, "Template rendering failed, using empty text");
                (String::new(), Some(e))
            }
        }
    }

    pub fn group_key(&self) -> &str {
        &self.context.group_key
    }
}

/// Derives status and shared content for a batch.
#[derive(Debug, Clone)]
pub struct Summarizer {
    templates: Arc<TemplateSet>,
    external_url: String,
}

impl Summarizer {
    pub fn new(templates: Arc<TemplateSet>, external_url: impl Into<String>) -> Self {
        Self {
            templates,
            external_url: external_url.into(),
        }
    }

    pub fn templates(&self) -> &Arc<TemplateSet> {
        &self.templates
    }

    /// Summarizes `batch` for the channel named `receiver`.
    pub fn summarize(&self, batch: &AlertBatch, receiver: &str) -> Summary {
        let context = TemplateContext::new(batch, receiver, &self.external_url);
        let mut render_errors = Vec::new();

        let context_value = match serde_json::to_value(&context) {
            Ok(v) => v,
            Err(e) => {
                render_errors.push(NotifyError::Render(format!(
                    "context not serializable: {e}"
                )));
                Value::Null
            }
        };

        let mut summary = Summary {
            status: context.status,
            title: String::new(),
            message: String::new(),
            external_url: self.external_url.clone(),
            context,
            context_value,
            render_errors,
        };

        let (title, title_err) = summary.render_or_empty(&self.templates, TITLE_TEMPLATE);
        let (message, message_err) = summary.render_or_empty(&self.templates, MESSAGE_TEMPLATE);
        summary.title = title;
        summary.message = message;
        summary
            .render_errors
            .extend(title_err.into_iter().chain(message_err));
        summary
    }
}
