//! Error types for the similarity server.
//!
//! A single error enum covers configuration, storage, model and index
//! failures. Callers that need to react to the *kind* of failure (bad
//! argument vs. missing state) use [`AppError::kind`] instead of matching on
//! message text.

use thiserror::Error;

/// Unified error type for the similarity server.
///
/// All fallible engine operations return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// A caller-supplied argument is unusable: missing training data, an
    /// unknown id used as a query key, an unknown training method.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation needs a trained model and none is active.
    #[error("No model trained: {0}")]
    Untrained(String),

    /// A lookup by id found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of [`AppError`] used at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad argument; the caller must change the request.
    BadArgument,
    /// The engine has not reached the state the operation requires.
    InvalidState,
    /// Referenced entity does not exist.
    NotFound,
    /// Everything else (I/O, storage, configuration).
    Internal,
}

impl AppError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidArgument(_) => ErrorKind::BadArgument,
            AppError::Untrained(_) => ErrorKind::InvalidState,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Storage(_)
            | AppError::Serialization(_)
            | AppError::Other(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::InvalidArgument("x".into()).kind(),
            ErrorKind::BadArgument
        );
        assert_eq!(AppError::Untrained("x".into()).kind(), ErrorKind::InvalidState);
        assert_eq!(AppError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(AppError::Storage("x".into()).kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_serde_json_conversion() {
        let err: AppError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
