use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatError {
    #[error("rule stat write failed: {0}")]
    StoreFailed(String),

    #[error("rule stat query failed: {0}")]
    QueryFailed(String),
}
