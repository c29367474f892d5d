//! Slack incoming-webhook integration.

use super::registry::{NotifierEnv, NotifierPlugin};
use super::{join_url, notify_on_resolve_default, Notifier, Payload, ALERT_LIST_PATH};
use crate::core::{AlertStatus, ChannelConfig};
use crate::error::{NotifyError, Result};
use crate::summary::Summary;
use crate::template::TemplateSet;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const KIND: &str = "slack";

const COLOR_FIRING: &str = "danger";
const COLOR_RESOLVED: &str = "good";

/// Posts one attachment per batch to a Slack webhook.
///
/// The `title` and `text` settings name templates in the shared set that
/// replace `default.title` / `default.message` for this channel.
pub struct SlackNotifier {
    webhook_url: String,
    templates: Arc<TemplateSet>,
    recipient: Option<String>,
    username: String,
    icon_emoji: Option<String>,
    mention: Option<String>,
    title_template: Option<String>,
    text_template: Option<String>,
    footer: String,
}

impl SlackNotifier {
    fn from_config(config: &ChannelConfig, env: &NotifierEnv) -> Result<Self> {
        let webhook_url = config.require_url()?.to_string();

        let mention = match config.setting_str("mentionChannel") {
            None => None,
            Some(m @ ("here" | "channel")) => Some(format!("<!{m}|{m}>")),
            Some(other) => {
                return Err(NotifyError::Configuration(format!(
                    "slack channel '{}': invalid mentionChannel '{other}', expected 'here' or 'channel'",
                    config.uid
                )))
            }
        };

        let template_setting = |key: &str| -> Result<Option<String>> {
            match config.setting_str(key) {
                None => Ok(None),
                Some(name) if env.templates.contains(name) => Ok(Some(name.to_string())),
                Some(name) => Err(NotifyError::Configuration(format!(
                    "slack channel '{}': {key} template \"{name}\" is not defined",
                    config.uid
                ))),
            }
        };

        Ok(Self {
            webhook_url,
            templates: Arc::clone(&env.templates),
            recipient: config.setting_str("recipient").map(str::to_string),
            username: config
                .setting_str("username")
                .unwrap_or(env.product_name.as_str())
                .to_string(),
            icon_emoji: config.setting_str("icon_emoji").map(str::to_string),
            mention,
            title_template: template_setting("title")?,
            text_template: template_setting("text")?,
            footer: env.monitoring_tool(),
        })
    }

    /// The channel's title/text, honoring template overrides, plus any
    /// override that failed to render.
    fn content(&self, summary: &Summary) -> (String, String, Vec<NotifyError>) {
        let mut errors = Vec::new();
        let mut render = |name: &str| {
            let (text, err) = summary.render_or_empty(&self.templates, name);
            errors.extend(err);
            text
        };

        let title = match &self.title_template {
            Some(name) => render(name),
            None => summary.title.clone(),
        };
        let mut text = match &self.text_template {
            Some(name) => render(name),
            None => summary.message.clone(),
        };
        if let Some(mention) = &self.mention {
            text = format!("{mention} {text}");
        }
        (title, text, errors)
    }
}

impl Notifier for SlackNotifier {
    fn kind(&self) -> &str {
        KIND
    }

    fn endpoint(&self) -> &str {
        &self.webhook_url
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
        let (title, text, render_errors) = self.content(summary);
        let color = match summary.status {
            AlertStatus::Firing => COLOR_FIRING,
            AlertStatus::Resolved => COLOR_RESOLVED,
        };

        let attachment = json!({
            "color": color,
            "title": title,
            "title_link": join_url(&summary.external_url, ALERT_LIST_PATH),
            "text": text,
            "fallback": title,
            "footer": self.footer,
            "ts": now.timestamp(),
        });

        let mut body = Map::new();
        body.insert("username".into(), Value::from(self.username.as_str()));
        if let Some(recipient) = &self.recipient {
            body.insert("channel".into(), Value::from(recipient.as_str()));
        }
        if let Some(icon) = &self.icon_emoji {
            body.insert("icon_emoji".into(), Value::from(icon.as_str()));
        }
        body.insert("attachments".into(), Value::Array(vec![attachment]));

        Ok(Payload::json(&Value::Object(body))?.with_render_errors(render_errors))
    }
}

// Plugin

pub struct SlackPlugin;

impl NotifierPlugin for SlackPlugin {
    fn kind(&self) -> &str {
        KIND
    }

    fn create(&self, config: &ChannelConfig, env: &NotifierEnv) -> Result<Box<dyn Notifier>> {
        Ok(Box::new(SlackNotifier::from_config(config, env)?))
    }
}
