use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::TryStreamExt;

use crate::error::{Result, StorageError};

/// Content type every generated object is uploaded with.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// User supplied metadata attached to an object.
///
/// Names are stored lowercase without the provider prefix
/// (`content-md5`, not `X-Amz-Meta-Content-Md5`).
pub type UserMetadata = BTreeMap<String, String>;

/// Stream of body chunks for a downloaded object.
pub type ObjectBody = BoxStream<'static, Result<Bytes>>;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    /// Provider assigned content-identity tag (ETag), as returned by the provider
    pub tag: Option<String>,
}

/// Acknowledgement of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub key: String,
    pub tag: Option<String>,
}

/// A downloaded object: its user metadata and a lazily read body.
pub struct ObjectDownload {
    pub metadata: UserMetadata,
    pub body: ObjectBody,
}

impl ObjectDownload {
    /// Look up a metadata field by (case-insensitive) name.
    pub fn metadata_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Drain the body into a single buffer.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        let mut body = self.body;
        while let Some(chunk) = body.try_next().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// The object storage capability consumed by the dataset tooling.
///
/// An implementation is bound to a single bucket. Every call is awaited
/// sequentially by its callers; implementations need not support concurrent
/// use beyond being `Send + Sync`.
#[async_trait]
pub trait ObjectStorage: Send + Sync + fmt::Debug {
    /// The bucket this storage is bound to.
    fn bucket(&self) -> &str;

    /// Create the bucket unless it already exists.
    ///
    /// # Returns
    /// * `Ok(true)` - the bucket was created by this call
    /// * `Ok(false)` - the bucket already existed
    async fn create_bucket_if_absent(&self) -> Result<bool>;

    /// Upload `payload` under `key`.
    ///
    /// The returned receipt carries the provider's tag for the stored object.
    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &UserMetadata,
    ) -> Result<PutReceipt>;

    /// Download an object.
    ///
    /// Should fail with `StorageError::NotFound` if `key` does not exist.
    async fn get_object(&self, key: &str) -> Result<ObjectDownload>;

    /// Recursively list every object in the bucket.
    ///
    /// The stream ends normally with `None` once the listing is exhausted;
    /// a listing failure is yielded in-band as `Some(Err(_))`.
    fn list_objects(&self) -> BoxStream<'_, Result<ObjectSummary>>;

    /// Delete an object.
    async fn delete_object(&self, key: &str) -> Result<()>;
}

/// Normalize a provider tag for comparison: strip surrounding quotes and
/// lowercase. S3 returns ETags quoted (`"9e107d9d..."`).
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().trim_matches('"').to_ascii_lowercase()
}

pub(crate) fn not_found(key: &str) -> StorageError {
    StorageError::NotFound(key.to_string())
}
