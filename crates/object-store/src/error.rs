//! Error types for the object storage capability.

/// Errors that can occur when talking to the object storage provider.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object storage client error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// HTTP transport error (bucket creation)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Endpoint could not be parsed or uses an unsupported form
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Key cannot be represented as an object path
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// Object not found
    #[error("object not found: {0}")]
    NotFound(String),

    /// Bucket does not exist
    #[error("bucket '{0}' does not exist")]
    BucketNotFound(String),

    /// Bucket creation rejected by the provider
    #[error("failed to create bucket '{bucket}': status {status}")]
    CreateBucket { bucket: String, status: u16 },

    /// Provider reported a failure that is not covered above
    #[error("storage provider error: {0}")]
    Provider(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
