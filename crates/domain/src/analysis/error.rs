use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unknown analysis module '{0}'")]
    UnknownModule(String),

    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("no stored alert with id '{0}'")]
    AlertNotFound(String),

    #[error("sample submission failed: {0}")]
    Submit(String),

    #[error("status check failed: {0}")]
    Status(String),

    #[error("cleanup failed: {0}")]
    Cleanup(String),
}
