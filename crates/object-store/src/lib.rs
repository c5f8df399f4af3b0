//! Object Storage Capability
//!
//! This crate provides the object storage surface the kitchensink dataset
//! tooling runs against: create a bucket, put/get/list/delete objects, and
//! read back the provider's content-identity tag (ETag) and user metadata.
//!
//! # Backends
//!
//! - [`S3Storage`]: any S3-compatible provider (AWS S3, MinIO, ...), built on
//!   the `object_store` crate's Amazon S3 client
//! - [`MemoryStorage`]: in-process storage with S3-like ETags and fault
//!   injection, for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use object_storage::{ObjectStorage, S3Storage, StorageConfig};
//!
//! # async fn example() -> Result<(), object_storage::StorageError> {
//! let config = StorageConfig {
//!     endpoint: "http://localhost:9000".to_string(),
//!     access_key: "minioadmin".to_string(),
//!     secret_key: "minioadmin".to_string(),
//!     bucket: "dataset".to_string(),
//!     region: None,
//!     insecure: false,
//! };
//! let storage = S3Storage::new(&config)?;
//! storage.create_bucket_if_absent().await?;
//! # Ok(())
//! # }
//! ```

mod endpoint;
mod error;
mod memory;
mod provider;
mod storage;

pub use endpoint::Endpoint;
pub use error::{Result, StorageError};
pub use memory::MemoryStorage;
pub use provider::{
    normalize_tag, ObjectBody, ObjectDownload, ObjectStorage, ObjectSummary, PutReceipt,
    UserMetadata, CONTENT_TYPE_OCTET_STREAM,
};
pub use storage::{S3Storage, StorageConfig, DEFAULT_REGION};
