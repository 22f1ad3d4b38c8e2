//! # Error Handling
//!
//! Error types for CubeDB operations.
//!
//! ## Design Principles
//!
//! 1. **Contextual**: Errors carry the operation and key that failed
//! 2. **Recoverable**: `NotFound` and `Conflict` are expected outcomes
//!    callers handle explicitly; they are not exceptional control flow
//! 3. **Retryable**: transient store errors are distinguished from fatal
//!    ones so the batch write engine can retry the right class

use thiserror::Error;

/// Result type alias for CubeDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Primary error type for CubeDB
#[derive(Error, Debug)]
pub enum Error {
    /// Point read or update target is absent.
    #[error("item not found: {pk}/{sk}")]
    NotFound { pk: String, sk: String },

    /// Creation collided with an existing row.
    #[error("item already exists: {pk}/{sk}")]
    AlreadyExists { pk: String, sk: String },

    /// Optimistic-lock version mismatch. Retry from a fresh read.
    #[error("version conflict on {pk}/{sk}: expected version {expected}")]
    Conflict {
        pk: String,
        sk: String,
        expected: u64,
    },

    /// Malformed caller input. Never retried; surfaced before any store I/O.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Connection reset/timeout/abort class. Retryable by the batch write
    /// engine; surfaced immediately everywhere else.
    #[error("transient store error during {operation}: {message}")]
    TransientStore { operation: String, message: String },

    /// Any other store failure. Not retried.
    #[error("store error during {operation}: {message}")]
    FatalStore { operation: String, message: String },

    /// A batch write chunk failed after retries were exhausted.
    #[error("batch write failed on chunk {chunk_index} ({chunk_size} items): {source}")]
    BatchWrite {
        chunk_index: usize,
        chunk_size: usize,
        #[source]
        source: Box<Error>,
    },

    /// Row payload could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Blob store key is absent.
    #[error("blob not found: {bucket}/{key}")]
    BlobNotFound { bucket: String, key: String },

    /// Blob store operation failed.
    #[error("blob error on {bucket}/{key}: {message}")]
    Blob {
        bucket: String,
        key: String,
        message: String,
    },
}

impl Error {
    pub fn not_found(key: &crate::types::RowKey) -> Self {
        Error::NotFound {
            pk: key.pk.clone(),
            sk: key.sk.clone(),
        }
    }

    /// Whether the error belongs to the retryable connection-failure class.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientStore { .. })
    }

    /// Get error code for monitoring
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "NOT_FOUND",
            Error::AlreadyExists { .. } => "ALREADY_EXISTS",
            Error::Conflict { .. } => "CONFLICT",
            Error::Validation { .. } => "VALIDATION_ERROR",
            Error::TransientStore { .. } => "TRANSIENT_STORE_ERROR",
            Error::FatalStore { .. } => "FATAL_STORE_ERROR",
            Error::BatchWrite { .. } => "BATCH_WRITE_ERROR",
            Error::Serialization { .. } => "SERIALIZATION_ERROR",
            Error::BlobNotFound { .. } => "BLOB_NOT_FOUND",
            Error::Blob { .. } => "BLOB_ERROR",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization {
            message: err.to_string(),
        }
    }
}
