use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    /// Store backstop: an insert was attempted for an id already present.
    #[error("alert already stored: {0}")]
    DuplicateKey(String),

    #[error("alert not found: {0}")]
    NotFound(String),

    #[error("malformed notification: {0}")]
    Malformed(String),

    #[error("alert store write failed: {0}")]
    StoreFailed(String),

    #[error("alert store query failed: {0}")]
    QueryFailed(String),
}
