use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use domain::alert::entity::Alert;
use domain::ingest::error::FeedError;
use ports::secondary::feed_source::NotificationFeed;
use serde_json::Value;

use super::{BodyError, build_client, read_capped_body, redact};

/// Maximum feed response size: 64 MiB.
const MAX_FEED_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Hunting notification feed over HTTP.
///
/// Issues `GET <url>?key=<api_key>` and expects
/// `{"notifications": [ {...}, ... ]}`. A batch is accepted whole or not
/// at all: one unusable entry rejects the entire response.
pub struct HttpNotificationFeed {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpNotificationFeed {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, FeedError> {
        let client = build_client(timeout)
            .map_err(|e| FeedError::Transport(format!("HTTP client init failed: {e}")))?;
        Ok(Self::with_client(client, url, api_key))
    }

    pub fn with_client(client: reqwest::Client, url: String, api_key: String) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    async fn do_fetch(&self) -> Result<Vec<Alert>, FeedError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FeedError::Transport(format!("feed request failed: {}", redact(e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Transport(format!("feed returned HTTP {status}")));
        }

        let body = read_capped_body(response, MAX_FEED_RESPONSE_SIZE)
            .await
            .map_err(|e| match e {
                BodyError::Transport(_) => FeedError::Transport(e.to_string()),
                BodyError::TooLarge(_) => FeedError::Malformed(e.to_string()),
            })?;

        let alerts = parse_notifications(&body)?;
        tracing::debug!(count = alerts.len(), "notification feed fetched");
        Ok(alerts)
    }
}

/// Parse a feed body into alerts, preserving delivery order.
pub fn parse_notifications(body: &[u8]) -> Result<Vec<Alert>, FeedError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| FeedError::Malformed(format!("invalid JSON: {e}")))?;

    let Some(entries) = value.get("notifications").and_then(Value::as_array) else {
        return Err(FeedError::Malformed(
            "response has no 'notifications' array".to_string(),
        ));
    };

    entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| match entry {
            Value::Object(fields) => Alert::from_fields(fields.clone())
                .map_err(|e| FeedError::Malformed(format!("notification #{idx}: {e}"))),
            _ => Err(FeedError::Malformed(format!(
                "notification #{idx} is not an object"
            ))),
        })
        .collect()
}

impl NotificationFeed for HttpNotificationFeed {
    fn fetch_notifications<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Alert>, FeedError>> + Send + 'a>> {
        Box::pin(self.do_fetch())
    }
}
