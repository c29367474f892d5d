#![allow(dead_code)]
pub mod mock_transport;

use alertdispatch::core::{Alert, AlertBatch, ChannelConfig};
use alertdispatch::template::TemplateSet;
use alertdispatch::{DispatchSettings, Dispatcher};
use chrono::Utc;
use mock_transport::MockTransport;
use std::sync::Arc;

pub const EXTERNAL_URL: &str = "http://grafana.local";

/// Creates a dispatcher over the built-in templates and `transport`.
pub fn dispatcher(transport: Arc<MockTransport>) -> Dispatcher {
    dispatcher_with_templates(TemplateSet::builtin().unwrap(), transport)
}

pub fn dispatcher_with_templates(
    templates: TemplateSet,
    transport: Arc<MockTransport>,
) -> Dispatcher {
    Dispatcher::new(
        Arc::new(templates),
        transport,
        DispatchSettings {
            external_url: EXTERNAL_URL.to_string(),
            product_name: "Grafana".to_string(),
            product_version: "9.0.0".to_string(),
            ..Default::default()
        },
    )
}

pub fn victorops(uid: &str, url: &str) -> ChannelConfig {
    ChannelConfig::new(uid, "victorops").with_url(url)
}

pub fn firing_batch() -> AlertBatch {
    AlertBatch::new(vec![
        Alert::firing([("alertname", "HighCPU"), ("instance", "a")]),
        Alert::firing([("alertname", "HighCPU"), ("instance", "b")]),
    ])
    .unwrap()
}

pub fn resolved_batch() -> AlertBatch {
    AlertBatch::new(vec![
        Alert::firing([("alertname", "HighCPU")]).resolve_at(Utc::now())
    ])
    .unwrap()
}
