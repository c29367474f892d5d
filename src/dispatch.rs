//! The dispatch coordinator.
//!
//! For every configured channel the [`Dispatcher`] runs one independent
//! pipeline: summarize the batch, decide whether to notify, build the
//! provider payload, then hand it to the [`Transport`]. Pipelines run
//! concurrently and never influence each other; every input channel yields
//! exactly one [`NotificationResult`], in input order.

use crate::core::{
    Alert, AlertBatch, AlertStatus, ChannelConfig, NotificationResult, Outcome, Transport,
};
use crate::error::{NotifyError, Result};
use crate::notification::{Channel, ChannelRegistry, NotifierEnv, Payload};
use crate::summary::Summarizer;
use crate::template::TemplateSet;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Process-wide settings the dispatcher is constructed with.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Base URL of the alerting UI, used for links in payloads.
    pub external_url: String,
    pub product_name: String,
    pub product_version: String,
    /// Delivery timeout for channels without their own `timeout_secs`.
    pub default_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            external_url: String::new(),
            product_name: "alertdispatch".to_string(),
            product_version: env!("CARGO_PKG_VERSION").to_string(),
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Runs notification decisions for a batch across many channels.
pub struct Dispatcher {
    registry: ChannelRegistry,
    env: NotifierEnv,
    summarizer: Summarizer,
    transport: Arc<dyn Transport>,
    default_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with the built-in provider kinds.
    pub fn new(
        templates: Arc<TemplateSet>,
        transport: Arc<dyn Transport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            registry: ChannelRegistry::default(),
            env: NotifierEnv {
                templates: Arc::clone(&templates),
                product_name: settings.product_name,
                product_version: settings.product_version,
            },
            summarizer: Summarizer::new(templates, settings.external_url),
            transport,
            default_timeout: settings.default_timeout,
        }
    }

    /// Replaces the provider registry.
    pub fn with_registry(mut self, registry: ChannelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Validates and builds every channel, one result per config.
    ///
    /// Callers can use this at configuration load time to reject broken
    /// channels before the first batch arrives.
    pub fn prepare(&self, configs: &[ChannelConfig]) -> Vec<Result<Channel>> {
        configs
            .iter()
            .map(|config| self.registry.build(config, &self.env))
            .collect()
    }

    /// Dispatches `alerts` after checking they form a valid batch.
    ///
    /// # Errors
    /// Returns [`NotifyError::InvalidInput`] for an empty alert list, before
    /// any channel is touched.
    pub async fn dispatch_alerts(
        &self,
        alerts: Vec<Alert>,
        channels: &[ChannelConfig],
        cancel: &CancellationToken,
    ) -> Result<Vec<NotificationResult>> {
        let batch = AlertBatch::new(alerts)?;
        Ok(self.dispatch(&batch, channels, cancel).await)
    }

    /// Notifies every channel about `batch`.
    ///
    /// Channels whose configuration is invalid are reported as failed and
    /// never reach the transport. The returned vector has one entry per
    /// element of `channels`, in the same order.
    #[instrument(skip_all, fields(alerts = batch.len(), channels = channels.len()))]
    pub async fn dispatch(
        &self,
        batch: &AlertBatch,
        channels: &[ChannelConfig],
        cancel: &CancellationToken,
    ) -> Vec<NotificationResult> {
        let prepared = self.prepare(channels);

        let pipelines = prepared
            .iter()
            .zip(channels)
            .map(|(built, config)| async move {
                match built {
                    Ok(channel) => self.run_channel(batch, channel, cancel).await,
                    Err(e) => {
                        error!(channel = %config.uid, kind = %config.kind, error = %e, "Channel excluded from dispatch");
                        record(NotificationResult::new(config, Outcome::failed(e)))
                    }
                }
            });
        let results = join_all(pipelines).await;

        let delivered = results
            .iter()
            .filter(|r| r.outcome == Outcome::Delivered)
            .count();
        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(delivered, failed, "Dispatch finished");
        results
    }

    /// One channel's pipeline: Evaluating -> {Suppressed, Notifying} ->
    /// {Delivered, Failed}.
    async fn run_channel(
        &self,
        batch: &AlertBatch,
        channel: &Channel,
        cancel: &CancellationToken,
    ) -> NotificationResult {
        let config = &channel.config;
        let notifier = channel.notifier.as_ref();

        if cancel.is_cancelled() {
            warn!(channel = %config.uid, "Dispatch cancelled before channel started");
            return record(NotificationResult::new(
                config,
                Outcome::failed(&NotifyError::Cancelled),
            ));
        }

        let receiver = if config.name.is_empty() {
            &config.uid
        } else {
            &config.name
        };
        let summary = self.summarizer.summarize(batch, receiver);
        let mut render_errors: Vec<String> =
            summary.render_errors.iter().map(|e| e.to_string()).collect();

        let outcome = if summary.status == AlertStatus::Resolved
            && !notifier.should_notify_on_resolve(config)
        {
            debug!(channel = %config.uid, "Resolve message disabled, suppressing notification");
            Outcome::Suppressed
        } else {
            let sent = match notifier.build_payload(&summary, config, Utc::now()) {
                Ok(payload) => {
                    render_errors.extend(payload.render_errors.iter().map(|e| e.to_string()));
                    self.deliver(channel, &payload, cancel).await
                }
                Err(e) => Err(e),
            };
            match sent {
                Ok(()) => Outcome::Delivered,
                Err(e) => {
                    error!(channel = %config.uid, kind = notifier.kind(), error = %e, "Failed to send notification");
                    Outcome::failed(&e)
                }
            }
        };

        for e in &render_errors {
            warn!(channel = %config.uid, error = %e, "Rendered notification with empty field");
        }
        metrics::counter!("notification_render_errors_total", "kind" => config.kind.clone())
            .increment(render_errors.len() as u64);

        let mut result = NotificationResult::new(config, outcome);
        result.render_errors = render_errors;
        record(result)
    }

    async fn deliver(
        &self,
        channel: &Channel,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let config = &channel.config;
        let notifier = channel.notifier.as_ref();

        let timeout = config
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        debug!(channel = %config.uid, endpoint = notifier.endpoint(), bytes = payload.body.len(), "Sending notification");
        let start = Instant::now();
        let send = self
            .transport
            .send(notifier.endpoint(), &payload.body, &payload.content_type);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(NotifyError::Cancelled),
            sent = tokio::time::timeout(timeout, send) => {
                sent.unwrap_or(Err(NotifyError::Timeout(timeout)))
            }
        };

        metrics::histogram!("notification_delivery_duration_seconds", "kind" => config.kind.clone())
            .record(start.elapsed().as_secs_f64());
        result
    }
}

fn record(result: NotificationResult) -> NotificationResult {
    metrics::counter!(
        "notifications_total",
        "kind" => result.channel_kind.clone(),
        "outcome" => result.outcome.label()
    )
    .increment(1);
    result
}
