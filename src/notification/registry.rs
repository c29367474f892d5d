use super::Notifier;
use crate::core::ChannelConfig;
use crate::error::{NotifyError, Result};
use crate::template::TemplateSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Process-wide values notifiers may embed into payloads.
#[derive(Debug, Clone)]
pub struct NotifierEnv {
    pub templates: Arc<TemplateSet>,
    pub product_name: String,
    pub product_version: String,
}

impl NotifierEnv {
    /// `"<product> v<version>"`, as shown to providers.
    pub fn monitoring_tool(&self) -> String {
        format!("{} v{}", self.product_name, self.product_version)
    }
}

/// Factory for one provider kind.
///
/// `create` validates the channel's settings; a channel that cannot be
/// built never reaches the dispatch loop.
pub trait NotifierPlugin: Send + Sync {
    /// The kind tag (e.g. `"victorops"`).
    fn kind(&self) -> &str;

    /// Builds a notifier for `config`.
    ///
    /// # Errors
    /// Returns [`NotifyError::Configuration`] if a required setting is
    /// absent or invalid.
    fn create(&self, config: &ChannelConfig, env: &NotifierEnv) -> Result<Box<dyn Notifier>>;
}

/// A validated channel: its configuration plus the notifier built from it.
pub struct Channel {
    pub config: ChannelConfig,
    pub notifier: Box<dyn Notifier>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("uid", &self.config.uid)
            .field("kind", &self.notifier.kind())
            .field("endpoint", &self.notifier.endpoint())
            .finish()
    }
}

/// Registry of [`NotifierPlugin`]s keyed by kind.
///
/// # Examples
///
/// ```
/// use alertdispatch::notification::ChannelRegistry;
///
/// let registry = ChannelRegistry::default();
/// assert!(registry.has_kind("victorops"));
/// assert!(registry.has_kind("slack"));
/// assert!(!registry.has_kind("carrier-pigeon"));
/// ```
pub struct ChannelRegistry {
    plugins: HashMap<String, Box<dyn NotifierPlugin>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            plugins: HashMap::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn NotifierPlugin>) {
        let kind = plugin.kind().to_string();
        self.plugins.insert(kind, plugin);
    }

    /// Validates `config` and builds its channel.
    pub fn build(&self, config: &ChannelConfig, env: &NotifierEnv) -> Result<Channel> {
        let plugin = self
            .plugins
            .get(&config.kind)
            .ok_or_else(|| NotifyError::UnknownKind(config.kind.clone()))?;
        if config.timeout_secs == Some(0) {
            return Err(NotifyError::Configuration(format!(
                "channel '{}': timeout_secs must be greater than zero",
                config.uid
            )));
        }
        let notifier = plugin.create(config, env)?;
        Ok(Channel {
            config: config.clone(),
            notifier,
        })
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.plugins.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(super::victorops::VictorOpsPlugin));
        registry.register(Box::new(super::slack::SlackPlugin));
        registry.register(Box::new(super::webhook::WebhookPlugin));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> NotifierEnv {
        NotifierEnv {
            templates: Arc::new(TemplateSet::builtin().unwrap()),
            product_name: "alertdispatch".into(),
            product_version: "1.2.3".into(),
        }
    }

    #[test]
    fn test_default_registry_kinds() {
        let registry = ChannelRegistry::default();
        assert_eq!(registry.kinds(), vec!["slack", "victorops", "webhook"]);
    }

    #[test]
    fn test_unknown_kind() {
        let registry = ChannelRegistry::default();
        let err = registry
            .build(&ChannelConfig::new("c1", "fax").with_url("https://x"), &env())
            .unwrap_err();
        assert_eq!(err, NotifyError::UnknownKind("fax".into()));
        assert_eq!(err.reason(), crate::error::FailureReason::Configuration);
    }

    #[test]
    fn test_every_builtin_kind_requires_url() {
        let registry = ChannelRegistry::default();
        for kind in registry.kinds() {
            let result = registry.build(&ChannelConfig::new("c1", kind), &env());
            assert!(
                matches!(result, Err(NotifyError::Configuration(_))),
                "{kind} accepted a channel without url"
            );
        }
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let registry = ChannelRegistry::default();
        let mut config = ChannelConfig::new("c1", "victorops").with_url("https://x");
        config.timeout_secs = Some(0);
        let err = registry.build(&config, &env()).unwrap_err();
        assert!(matches!(err, NotifyError::Configuration(ref m) if m.contains("timeout_secs")));

        config.timeout_secs = Some(1);
        assert!(registry.build(&config, &env()).is_ok());
    }

    #[test]
    fn test_build_keeps_config() {
        let registry = ChannelRegistry::default();
        let config = ChannelConfig::new("c1", "victorops").with_url("https://x");
        let channel = registry.build(&config, &env()).unwrap();
        assert_eq!(channel.config, config);
        assert_eq!(channel.notifier.kind(), "victorops");
        assert_eq!(channel.notifier.endpoint(), "https://x");
    }

    #[test]
    fn test_monitoring_tool() {
        assert_eq!(env().monitoring_tool(), "alertdispatch v1.2.3");
    }
}
