use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use domain::alert::entity::FieldMap;
use domain::ingest::error::EnrichError;
use ports::secondary::report_source::ReportSource;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;

use super::{BodyError, build_client, read_capped_body, redact};

/// Maximum report size: 16 MiB.
const MAX_REPORT_SIZE: usize = 16 * 1024 * 1024;

/// File report lookup keyed by content hash.
///
/// Issues `GET <url>?resource=<hash>&apikey=<api_key>`. The key is the
/// enrichment credential, configured separately from the feed key.
pub struct HttpReportSource {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HttpReportSource {
    pub fn new(url: String, api_key: String, timeout: Duration) -> Result<Self, EnrichError> {
        let client = build_client(timeout)
            .map_err(|e| EnrichError::Transport(format!("HTTP client init failed: {e}")))?;
        Ok(Self::with_client(client, url, api_key))
    }

    pub fn with_client(client: reqwest::Client, url: String, api_key: String) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    async fn do_fetch(&self, content_hash: &str) -> Result<FieldMap, EnrichError> {
        if content_hash.trim().is_empty() {
            return Err(EnrichError::InvalidHash);
        }

        let response = self
            .client
            .get(&self.url)
            .query(&[("resource", content_hash), ("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| EnrichError::Transport(format!("report request failed: {}", redact(e))))?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(EnrichError::NotFound(content_hash.to_string())),
            // The service answers 204 with an empty body when the quota is spent.
            StatusCode::TOO_MANY_REQUESTS | StatusCode::NO_CONTENT => {
                return Err(EnrichError::RateLimited {
                    retry_after_secs: parse_retry_after(response.headers()),
                });
            }
            s if !s.is_success() => {
                return Err(EnrichError::Transport(format!("report endpoint returned HTTP {s}")));
            }
            _ => {}
        }

        let body = read_capped_body(response, MAX_REPORT_SIZE)
            .await
            .map_err(|e| match e {
                BodyError::Transport(_) => EnrichError::Transport(e.to_string()),
                BodyError::TooLarge(_) => EnrichError::Malformed(e.to_string()),
            })?;

        parse_report(content_hash, &body)
    }
}

/// Interpret a report body.
///
/// A `response_code` of 0 or below means the service has no finished
/// report for the hash.
pub fn parse_report(content_hash: &str, body: &[u8]) -> Result<FieldMap, EnrichError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| EnrichError::Malformed(format!("invalid JSON: {e}")))?;

    let Value::Object(fields) = value else {
        return Err(EnrichError::Malformed("report is not a JSON object".to_string()));
    };

    if let Some(code) = fields.get("response_code").and_then(Value::as_i64)
        && code <= 0
    {
        return Err(EnrichError::NotFound(content_hash.to_string()));
    }

    Ok(fields)
}

/// Delay-seconds form of `Retry-After`. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

impl ReportSource for HttpReportSource {
    fn fetch_report<'a>(
        &'a self,
        content_hash: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<FieldMap, EnrichError>> + Send + 'a>> {
        Box::pin(self.do_fetch(content_hash))
    }
}
