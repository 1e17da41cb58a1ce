use std::time::Duration;

use thiserror::Error;

use crate::alert::error::AlertError;

/// Failure fetching the notification feed. Either variant aborts the run.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed transport error: {0}")]
    Transport(String),

    #[error("malformed feed response: {0}")]
    Malformed(String),
}

/// Failure fetching an enrichment report. Never fatal to a run.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("enrichment transport error: {0}")]
    Transport(String),

    #[error("no report for '{0}'")]
    NotFound(String),

    #[error("enrichment rate limited")]
    RateLimited {
        /// Delay advertised by the service, if any.
        retry_after_secs: Option<u64>,
    },

    #[error("malformed enrichment report: {0}")]
    Malformed(String),

    #[error("content hash must not be empty")]
    InvalidHash,
}

impl EnrichError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Failure calling the retirement endpoint. A partial confirmation is
/// not an error: see `RetirementResult`.
#[derive(Debug, Error)]
pub enum RetireError {
    #[error("retirement transport error: {0}")]
    Transport(String),

    #[error("malformed retirement response: {0}")]
    Malformed(String),
}

/// Failure that aborts an entire ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] AlertError),

    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    #[error("ingestion run exceeded {0:?}")]
    Timeout(Duration),
}
