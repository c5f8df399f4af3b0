use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use md5::{Digest, Md5};
use parking_lot::RwLock;

use crate::error::{Result, StorageError};
use crate::provider::{
    not_found, ObjectDownload, ObjectStorage, ObjectSummary, PutReceipt, UserMetadata,
};

/// Bodies are handed out in chunks of this size to exercise streaming readers.
const BODY_CHUNK_SIZE: usize = 64 * 1024;

/// In-memory object storage with S3-like semantics.
///
/// Tags are quoted MD5 hex strings, like single-part S3 ETags. Metadata
/// names are lowercased on write. Operations fail with
/// `StorageError::BucketNotFound` until the bucket is created.
///
/// Faults can be injected per key to simulate provider failures and
/// corruption in transit.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bucket: String,
    inner: Arc<RwLock<MemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct MemoryStorageInner {
    bucket_exists: bool,
    objects: BTreeMap<String, MemoryObject>,
    faults: Faults,
    /// Count of put calls, including failed ones
    puts: usize,
    /// Count of delete calls, including failed ones
    deletes: usize,
}

#[derive(Debug, Clone)]
struct MemoryObject {
    payload: Bytes,
    content_type: String,
    metadata: UserMetadata,
    tag: String,
}

#[derive(Debug, Default)]
struct Faults {
    /// Keys whose downloaded bytes get one byte altered
    corrupt_reads: BTreeSet<String>,
    failing_puts: BTreeSet<String>,
    failing_deletes: BTreeSet<String>,
    /// Keys that are listed but can be neither fetched nor deleted, the
    ///  way a client that rewrites keys sees `logs/` or `a//b` on S3
    unreachable: BTreeSet<String>,
    /// Yield this many listing entries, then a listing error
    list_error_after: Option<usize>,
}

impl MemoryStorage {
    /// Storage for a bucket that does not exist yet.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            inner: Arc::new(RwLock::new(MemoryStorageInner::default())),
        }
    }

    /// Storage for a bucket that already exists (and is empty).
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        let storage = Self::new(bucket);
        storage.inner.write().bucket_exists = true;
        storage
    }

    pub fn bucket_exists(&self) -> bool {
        self.inner.read().bucket_exists
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().objects.contains_key(key)
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys in listing order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.read().objects.keys().cloned().collect()
    }

    /// Content type an object was stored with.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .objects
            .get(key)
            .map(|object| object.content_type.clone())
    }

    /// Number of `put_object` calls made so far.
    pub fn put_calls(&self) -> usize {
        self.inner.read().puts
    }

    /// Number of `delete_object` calls made so far.
    pub fn delete_calls(&self) -> usize {
        self.inner.read().deletes
    }

    /// Alter one byte of `key`'s body on every subsequent download.
    pub fn corrupt_on_read(&self, key: impl Into<String>) {
        self.inner.write().faults.corrupt_reads.insert(key.into());
    }

    /// Reject uploads of `key`.
    pub fn fail_put(&self, key: impl Into<String>) {
        self.inner.write().faults.failing_puts.insert(key.into());
    }

    /// Reject deletes of `key`.
    pub fn fail_delete(&self, key: impl Into<String>) {
        self.inner.write().faults.failing_deletes.insert(key.into());
    }

    /// List an empty object under `key` that reads as missing and
    ///  survives deletes.
    pub fn list_unreachable(&self, key: impl Into<String>) {
        self.inner.write().faults.unreachable.insert(key.into());
    }

    /// Terminate listings with an error after `entries` objects.
    pub fn fail_list_after(&self, entries: usize) {
        self.inner.write().faults.list_error_after = Some(entries);
    }

    /// Overwrite an object's stored metadata, leaving payload and tag alone.
    pub fn set_metadata(&self, key: &str, metadata: UserMetadata) -> Result<()> {
        let mut inner = self.inner.write();
        let object = inner.objects.get_mut(key).ok_or_else(|| not_found(key))?;
        object.metadata = normalize_metadata(&metadata);
        Ok(())
    }

    /// Overwrite an object's stored payload without updating its tag.
    pub fn replace_payload(&self, key: &str, payload: Bytes) -> Result<()> {
        let mut inner = self.inner.write();
        let object = inner.objects.get_mut(key).ok_or_else(|| not_found(key))?;
        object.payload = payload;
        Ok(())
    }

    fn require_bucket(&self, inner: &MemoryStorageInner) -> Result<()> {
        if inner.bucket_exists {
            Ok(())
        } else {
            Err(StorageError::BucketNotFound(self.bucket.clone()))
        }
    }
}

fn normalize_metadata(metadata: &UserMetadata) -> UserMetadata {
    metadata
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .collect()
}

fn etag(payload: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(payload)))
}

fn corrupt(payload: &Bytes) -> Bytes {
    let mut altered = payload.to_vec();
    match altered.first_mut() {
        Some(byte) => *byte ^= 0xff,
        None => altered.push(0),
    }
    Bytes::from(altered)
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket_if_absent(&self) -> Result<bool> {
        let mut inner = self.inner.write();
        if inner.bucket_exists {
            return Ok(false);
        }
        inner.bucket_exists = true;
        Ok(true)
    }

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &UserMetadata,
    ) -> Result<PutReceipt> {
        let mut inner = self.inner.write();
        inner.puts += 1;
        self.require_bucket(&inner)?;

        if inner.faults.failing_puts.contains(key) {
            return Err(StorageError::Provider(format!("injected put failure for {}", key)));
        }

        let tag = etag(&payload);
        inner.objects.insert(
            key.to_string(),
            MemoryObject {
                payload,
                content_type: content_type.to_string(),
                metadata: normalize_metadata(metadata),
                tag: tag.clone(),
            },
        );

        Ok(PutReceipt {
            key: key.to_string(),
            tag: Some(tag),
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectDownload> {
        let inner = self.inner.read();
        self.require_bucket(&inner)?;

        if inner.faults.unreachable.contains(key) {
            return Err(not_found(key));
        }

        let object = inner.objects.get(key).ok_or_else(|| not_found(key))?;
        let payload = if inner.faults.corrupt_reads.contains(key) {
            corrupt(&object.payload)
        } else {
            object.payload.clone()
        };

        let chunks: Vec<Result<Bytes>> = payload
            .chunks(BODY_CHUNK_SIZE)
            .map(|chunk| Ok(payload.slice_ref(chunk)))
            .collect();

        Ok(ObjectDownload {
            metadata: object.metadata.clone(),
            body: stream::iter(chunks).boxed(),
        })
    }

    fn list_objects(&self) -> BoxStream<'_, Result<ObjectSummary>> {
        let inner = self.inner.read();
        if !inner.bucket_exists {
            let err = StorageError::BucketNotFound(self.bucket.clone());
            return stream::once(async move { Err(err) }).boxed();
        }

        // Snapshot so deletes issued while consuming the listing don't deadlock.
        let mut summaries: BTreeMap<&str, ObjectSummary> = inner
            .objects
            .iter()
            .map(|(key, object)| {
                let summary = ObjectSummary {
                    key: key.clone(),
                    size: object.payload.len() as u64,
                    tag: Some(object.tag.clone()),
                };
                (key.as_str(), summary)
            })
            .collect();
        for key in &inner.faults.unreachable {
            summaries.insert(
                key.as_str(),
                ObjectSummary {
                    key: key.clone(),
                    size: 0,
                    tag: None,
                },
            );
        }
        let mut entries: Vec<Result<ObjectSummary>> = summaries.into_values().map(Ok).collect();

        if let Some(limit) = inner.faults.list_error_after {
            entries.truncate(limit);
            entries.push(Err(StorageError::Provider(
                "injected listing failure".to_string(),
            )));
        }

        stream::iter(entries).boxed()
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.deletes += 1;
        self.require_bucket(&inner)?;

        if inner.faults.failing_deletes.contains(key) {
            return Err(StorageError::Provider(format!(
                "injected delete failure for {}",
                key
            )));
        }

        // S3 semantics: deleting a missing key succeeds. Unreachable keys
        // stay listed.
        inner.objects.remove(key);
        Ok(())
    }
}
