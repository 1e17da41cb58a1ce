//! reqwest clients for the remote intelligence service.

pub mod notification_feed;
pub mod report_source;
pub mod retirement_client;

use std::time::Duration;

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("feedsentinel/", env!("CARGO_PKG_VERSION"));

/// Failure reading a response body.
#[derive(Debug)]
pub(crate) enum BodyError {
    Transport(String),
    TooLarge(usize),
}

impl std::fmt::Display for BodyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "body read failed: {msg}"),
            Self::TooLarge(max) => write!(f, "response exceeded {max} byte limit"),
        }
    }
}

/// Build a client with the shared user agent and a request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Strip the request URL from a reqwest error. URLs carry the API key
/// as a query parameter and must not end up in logs.
pub(crate) fn redact(e: reqwest::Error) -> String {
    e.without_url().to_string()
}

/// Read a response body in chunks, refusing anything over `max` bytes.
pub(crate) async fn read_capped_body(
    mut response: reqwest::Response,
    max: usize,
) -> Result<Vec<u8>, BodyError> {
    // u64 -> usize saturates on 32-bit, which is rejected below anyway.
    let content_length: usize = response
        .content_length()
        .unwrap_or(0)
        .try_into()
        .unwrap_or(usize::MAX);

    if content_length > max {
        return Err(BodyError::TooLarge(max));
    }

    let mut body = Vec::with_capacity(content_length.min(max));
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| BodyError::Transport(redact(e)))?
    {
        if body.len() + chunk.len() > max {
            return Err(BodyError::TooLarge(max));
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
