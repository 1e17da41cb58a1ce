use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use domain::ingest::entity::RetirementResult;
use domain::ingest::error::RetireError;
use ports::secondary::retirement_port::RetirementPort;
use serde::Deserialize;
use tracing::warn;

use super::{build_client, read_capped_body, redact};

const MAX_RETIRE_RESPONSE_SIZE: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
struct RetireResponse {
    deleted: usize,
    received: usize,
}

/// Marks notifications as consumed on the remote service.
///
/// Issues `POST <url>?key=<api_key>` with a JSON array of ids and reads
/// back `{"deleted": N, "received": M}`.
pub struct HttpRetirementClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpRetirementClient {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, RetireError> {
        let client = build_client(timeout)
            .map_err(|e| RetireError::Transport(format!("HTTP client init failed: {e}")))?;
        Ok(Self::with_client(client, url, api_key))
    }

    pub fn with_client(client: reqwest::Client, url: String, api_key: String) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    async fn do_retire(&self, alert_ids: &BTreeSet<String>) -> Result<RetirementResult, RetireError> {
        if alert_ids.is_empty() {
            return Ok(RetirementResult::new(0, 0));
        }

        let ids: Vec<&str> = alert_ids.iter().map(String::as_str).collect();
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&ids)
            .send()
            .await
            .map_err(|e| RetireError::Transport(format!("retire request failed: {}", redact(e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetireError::Transport(format!(
                "retire endpoint returned HTTP {status}"
            )));
        }

        let body = read_capped_body(response, MAX_RETIRE_RESPONSE_SIZE)
            .await
            .map_err(|e| RetireError::Transport(e.to_string()))?;
        let parsed: RetireResponse = serde_json::from_slice(&body)
            .map_err(|e| RetireError::Malformed(format!("unexpected retire response: {e}")))?;

        // Completeness is judged against what was sent, never the server's echo.
        if parsed.received != ids.len() {
            warn!(
                sent = ids.len(),
                received = parsed.received,
                deleted = parsed.deleted,
                "retire endpoint acknowledged a different id count than sent"
            );
        }
        Ok(RetirementResult::new(ids.len(), parsed.deleted))
    }
}

impl RetirementPort for HttpRetirementClient {
    fn retire<'a>(
        &'a self,
        alert_ids: &'a BTreeSet<String>,
    ) -> Pin<Box<dyn Future<Output = Result<RetirementResult, RetireError>> + Send + 'a>> {
        Box::pin(self.do_retire(alert_ids))
    }
}
