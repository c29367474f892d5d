//! Provider-specific payload construction.
//!
//! Every provider kind implements [`Notifier`]: it decides whether a fully
//! resolved batch should be sent at all and encodes the shared [`Summary`]
//! into the provider's wire format. Notifiers never talk to the network;
//! delivery is the dispatcher's job through a [`Transport`].
//!
//! Notifiers are created through the [`registry::ChannelRegistry`], which is
//! also the only place channel settings are validated.
//!
//! [`Transport`]: crate::core::Transport

pub mod registry;
pub mod slack;
pub mod victorops;
pub mod webhook;

use crate::core::ChannelConfig;
use crate::error::{NotifyError, Result};
use crate::summary::Summary;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use registry::{Channel, ChannelRegistry, NotifierEnv, NotifierPlugin};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Path of the alert list page, relative to the external URL.
pub const ALERT_LIST_PATH: &str = "/alerting/list";

/// An encoded body ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub body: Vec<u8>,
    pub content_type: String,
    /// Channel-specific template failures hit while building the body.
    pub render_errors: Vec<NotifyError>,
}

impl Payload {
    /// Encodes `value` as a JSON payload.
    ///
    /// # Errors
    /// Returns [`NotifyError::Serialization`](crate::error::NotifyError::Serialization)
    /// if `value` cannot be encoded.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_vec(value)?,
            content_type: CONTENT_TYPE_JSON.to_string(),
            render_errors: Vec::new(),
        })
    }

    pub fn with_render_errors(mut self, errors: Vec<NotifyError>) -> Self {
        self.render_errors = errors;
        self
    }
}

/// A provider variant bound to one channel's validated settings.
pub trait Notifier: Send + Sync {
    /// The provider kind tag this notifier was registered under.
    fn kind(&self) -> &str;

    /// Endpoint the payload is delivered to.
    fn endpoint(&self) -> &str;

    /// Whether a batch whose aggregate status is `resolved` is sent at all.
    fn should_notify_on_resolve(&self, config: &ChannelConfig) -> bool;

    /// Encodes the provider's wire body.
    fn build_payload(
        &self,
        summary: &Summary,
        config: &ChannelConfig,
        now: DateTime<Utc>,
    ) -> Result<Payload>;
}

/// The shared resolve policy: notify unless the channel disabled it.
pub fn notify_on_resolve_default(config: &ChannelConfig) -> bool {
    !config.disable_resolve_message
}

/// Appends `path` to `base` with exactly one `/` between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
