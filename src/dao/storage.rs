use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by external stores (question bank, results endpoint) regardless of transport.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached at all.
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Backend answered with a non-success status.
    #[error("unexpected status {status} from `{endpoint}`")]
    Status { endpoint: String, status: u16 },
    /// Backend answered but the payload could not be understood.
    #[error("invalid payload from `{endpoint}`: {message}")]
    InvalidPayload { endpoint: String, message: String },
    /// Requested records do not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Unavailable { .. } => true,
            StorageError::Status { status, .. } => *status >= 500 || *status == 429,
            StorageError::InvalidPayload { .. } | StorageError::NotFound(_) => false,
        }
    }
}
