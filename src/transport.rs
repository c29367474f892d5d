//! HTTP delivery of encoded payloads.

use crate::core::Transport;
use crate::error::NotifyError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Longest response body kept in error messages.
pub const MAX_ERROR_BODY: usize = 512;

/// Posts payloads with a shared `reqwest` client.
///
/// Does not retry; a non-2xx answer is reported as
/// [`NotifyError::Status`]. Only connection setup is bounded here; the total
/// time of a delivery is bounded per channel by the dispatcher.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    connect_timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport that gives up connecting after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("alertdispatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(bytes = body.len()))]
    async fn send(&self, url: &str, body: &[u8], content_type: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to notification endpoint failed");
                if e.is_timeout() {
                    NotifyError::Timeout(self.connect_timeout)
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = %status, "Notification accepted");
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        error!(status = %status, body = %text, "Notification endpoint rejected payload");
        Err(NotifyError::Status {
            status: status.as_u16(),
            body: truncate(&text, MAX_ERROR_BODY),
        })
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
