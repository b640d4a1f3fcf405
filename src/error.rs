//! Error types for request validation and agent item evaluation.
//!
//! The aggregation itself never fails; these errors only exist at the edges,
//! before a scan starts.

/// Rejected aggregation request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Process name must not be empty")]
    EmptyProcessName,
}

/// Failure to evaluate an agent item key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("Malformed item key: {0}")]
    MalformedKey(String),

    #[error("Unsupported item key: {0}")]
    UnsupportedKey(String),

    #[error("You must set one or two parameters.")]
    ParameterCount(usize),

    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
}
