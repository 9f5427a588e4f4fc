use std::time::Duration;
use thiserror::Error;

/// Failures raised by the underlying document-store transport.
///
/// Only `NetworkTimeout` and `ConnectionFailure` are transient; everything
/// else is fatal and never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Network timeout: {0}")]
    NetworkTimeout(String),

    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Operation failure: {0}")]
    OperationFailure(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkTimeout(_) | Self::ConnectionFailure(_))
    }
}

#[derive(Error, Debug)]
pub enum ScopeError {
    #[error("'{kind}' object has no attribute '{name}'")]
    AttributeNotFound { kind: String, name: String },

    #[error("Cannot bind arguments for '{method}': {reason}")]
    ArityMismatch { method: String, reason: String },

    #[error("Argument '{0}' is not an aggregation pipeline")]
    InvalidPipelineArgument(String),

    #[error("Operation kept failing for {elapsed:?}, exceeding the {budget:?} retry budget")]
    TimeoutExceeded { elapsed: Duration, budget: Duration },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl ScopeError {
    pub fn attribute_not_found(kind: &str, name: &str) -> Self {
        Self::AttributeNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }
    }

    pub fn arity(method: &str, reason: impl Into<String>) -> Self {
        Self::ArityMismatch {
            method: method.to_string(),
            reason: reason.into(),
        }
    }

    /// True when the error is a transport failure worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(err) if err.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, ScopeError>;

impl<T> From<std::sync::PoisonError<T>> for ScopeError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}
