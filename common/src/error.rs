//! Error taxonomy shared by every storprobe operation
//!
//! Adapters report failures as `anyhow::Error`. The operations facade is the only
//! place that turns those into [`Error`] before handing them to a caller.

/// Classified failure of a storage operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Bad input detected before any backend call was made
    #[error("{0}")]
    Validation(String),
    /// A backend/operation combination that is deliberately not implemented
    #[error("{0}")]
    NotSupported(String),
    /// A backend call was attempted and failed
    #[error("{0}")]
    StorageOperation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Wraps an adapter failure, keeping the whole cause chain in the message.
    pub fn storage(context: impl std::fmt::Display, source: &anyhow::Error) -> Self {
        Error::StorageOperation(format!("{context}: {source:#}"))
    }

    /// True for every error raised before a backend was contacted.
    ///
    /// `NotSupported` counts as a validation failure: callers that only care whether
    /// the request itself was rejected do not need to distinguish the two.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::NotSupported(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Error::Validation(msg) | Error::NotSupported(msg) | Error::StorageOperation(msg) => msg,
        }
    }
}
