#![allow(dead_code)]
//! A transport that records requests instead of sending them.

use alertdispatch::core::Transport;
use alertdispatch::error::NotifyError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

impl SentRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Answers `Ok` for every URL except those registered with `failing`.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentRequest>>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    pub started: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `url` fails with a transport error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Every send sleeps for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn requests_to(&self, url: &str) -> Vec<SentRequest> {
        self.requests().into_iter().filter(|r| r.url == url).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, url: &str, body: &[u8], content_type: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(SentRequest {
            url: url.to_string(),
            body: body.to_vec(),
            content_type: content_type.to_string(),
        });
        self.started.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(url) {
            return Err(NotifyError::Transport(format!("connection refused: {url}")));
        }
        Ok(())
    }
}
