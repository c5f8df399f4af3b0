//! # Dataset
//!
//! Builds the fixed "kitchen sink" dataset in a bucket:
//!
//! - **Sibling folders**: `folder000/tests00@0`, `folder001/tests00@1`, ...
//! - **Nested folders**: `folder000/folder00/tests00`, ...
//! - **Zero-length object**: `zero-bytes`
//! - **Deep key with special characters**:
//!   `folder000/folder00/folder-test/folder-x/folder/sample!&`
//! - **Multi-megabyte object**: `folder003/large-object`, just above the
//!   5 MiB multipart threshold most S3 clients use
//!
//! Every object carries its hex MD5 digest in the `content-md5` user
//! metadata field. The provider tag returned by each upload is recorded in a
//! [`Manifest`], which is uploaded last under the reserved manifest key.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use object_storage::{
    ObjectStorage, PutReceipt, StorageError, UserMetadata, CONTENT_TYPE_OCTET_STREAM,
};

use crate::content::{self, ContentDigest, ContentError, SizePolicy};
use crate::manifest::{Manifest, ManifestError};

/// Key the manifest is stored under unless configured otherwise
pub const DEFAULT_MANIFEST_KEY: &str = "kitchensink";
/// User metadata field carrying the hex digest of an object's payload
pub const DIGEST_METADATA_KEY: &str = "content-md5";
/// Part size above which most S3 clients switch to multipart uploads
pub const MULTIPART_THRESHOLD_BYTES: u64 = 5 * 1024 * 1024;
/// 5 MiB + 7 bytes
pub const DEFAULT_LARGE_OBJECT_BYTES: u64 = MULTIPART_THRESHOLD_BYTES + 7;
pub const DEFAULT_FOLDERS: usize = 3;

pub const ZERO_BYTES_KEY: &str = "zero-bytes";
pub const DEEP_KEY: &str = "folder000/folder00/folder-test/folder-x/folder/sample!&";

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("failed to prepare bucket: {0}")]
    Bucket(#[source] StorageError),
    #[error("upload of '{key}' failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("provider returned no tag for '{0}'")]
    MissingTag(String),
    #[error("dataset key '{0}' collides with the manifest key")]
    ReservedKey(String),
}

/// Settings for a dataset build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Object key the manifest is written to
    #[serde(default = "default_manifest_key")]
    pub manifest_key: String,
    /// Size policy for every object that is not the zero-length
    ///  or the large object
    #[serde(default)]
    pub size_policy: SizePolicy,
    /// Size of the multi-megabyte object. Not checked against
    ///  [`MULTIPART_THRESHOLD_BYTES`] here so tests can shrink it
    #[serde(default = "default_large_object_bytes")]
    pub large_object_bytes: u64,
    /// Number of sibling top-level folders
    #[serde(default = "default_folders")]
    pub folders: usize,
}

fn default_manifest_key() -> String {
    DEFAULT_MANIFEST_KEY.to_string()
}

fn default_large_object_bytes() -> u64 {
    DEFAULT_LARGE_OBJECT_BYTES
}

fn default_folders() -> usize {
    DEFAULT_FOLDERS
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            manifest_key: default_manifest_key(),
            size_policy: SizePolicy::default(),
            large_object_bytes: default_large_object_bytes(),
            folders: default_folders(),
        }
    }
}

/// One object of the dataset layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub key: String,
    pub size: SizePolicy,
}

impl DatasetEntry {
    fn new(key: impl Into<String>, size: SizePolicy) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

impl DatasetConfig {
    /// The keys this configuration produces, in upload order.
    pub fn layout(&self) -> Vec<DatasetEntry> {
        let mut entries = Vec::with_capacity(self.folders * 2 + 3);

        for i in 0..self.folders {
            entries.push(DatasetEntry::new(
                format!("folder{:03}/tests00@{}", i, i),
                self.size_policy,
            ));
            entries.push(DatasetEntry::new(
                format!("folder{:03}/folder{:02}/tests{:02}", i, i, i),
                self.size_policy,
            ));
        }

        entries.push(DatasetEntry::new(ZERO_BYTES_KEY, SizePolicy::Zero));
        entries.push(DatasetEntry::new(DEEP_KEY, self.size_policy));
        entries.push(DatasetEntry::new(
            format!("folder{:03}/large-object", self.folders),
            SizePolicy::Fixed {
                bytes: self.large_object_bytes,
            },
        ));

        entries
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub bucket: String,
    /// Whether this run had to create the bucket
    pub bucket_created: bool,
    pub manifest_key: String,
    pub manifest: Manifest,
    /// Objects uploaded, not counting the manifest
    pub objects: usize,
    /// Payload bytes uploaded, not counting the manifest
    pub total_bytes: u64,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Created {} objects ({} bytes) in bucket {}; manifest written to {}",
            self.objects, self.total_bytes, self.bucket, self.manifest_key
        )
    }
}

/// Generate and upload the dataset, then upload its manifest.
///
/// Any failure aborts the build immediately. Objects uploaded before the
/// failure are left in place and the manifest is not written.
pub async fn build_dataset<S>(
    storage: &S,
    config: &DatasetConfig,
) -> Result<BuildReport, DatasetError>
where
    S: ObjectStorage + ?Sized,
{
    config.size_policy.validate()?;
    SizePolicy::Fixed {
        bytes: config.large_object_bytes,
    }
    .validate()?;

    let layout = config.layout();
    if let Some(entry) = layout.iter().find(|e| e.key == config.manifest_key) {
        return Err(DatasetError::ReservedKey(entry.key.clone()));
    }

    let bucket_created = storage
        .create_bucket_if_absent()
        .await
        .map_err(DatasetError::Bucket)?;

    tracing::info!(
        bucket = %storage.bucket(),
        objects = layout.len(),
        bucket_created,
        "creating dataset"
    );

    let mut manifest = Manifest::new();
    let mut total_bytes = 0u64;

    for entry in &layout {
        let content = content::generate(&entry.size)?;
        let size = content.size();

        let receipt = upload(storage, &entry.key, content.payload, &content.digest).await?;
        let tag = receipt
            .tag
            .ok_or_else(|| DatasetError::MissingTag(receipt.key.clone()))?;

        tracing::debug!(
            key = %receipt.key,
            size,
            digest = %content.digest,
            tag = %tag,
            "uploaded object"
        );

        manifest.record(receipt.key, tag);
        total_bytes += size;
    }

    let manifest_bytes = manifest.serialize()?;
    let manifest_digest = ContentDigest::of(&manifest_bytes);
    upload(
        storage,
        &config.manifest_key,
        Bytes::from(manifest_bytes),
        &manifest_digest,
    )
    .await?;

    tracing::info!(
        bucket = %storage.bucket(),
        manifest_key = %config.manifest_key,
        entries = manifest.len(),
        total_bytes,
        "dataset created"
    );

    Ok(BuildReport {
        bucket: storage.bucket().to_string(),
        bucket_created,
        manifest_key: config.manifest_key.clone(),
        manifest,
        objects: layout.len(),
        total_bytes,
    })
}

/// Upload one payload with its digest attached as user metadata.
async fn upload<S>(
    storage: &S,
    key: &str,
    payload: Bytes,
    digest: &ContentDigest,
) -> Result<PutReceipt, DatasetError>
where
    S: ObjectStorage + ?Sized,
{
    let mut metadata = UserMetadata::new();
    metadata.insert(DIGEST_METADATA_KEY.to_string(), digest.to_hex());

    storage
        .put_object(key, payload, CONTENT_TYPE_OCTET_STREAM, &metadata)
        .await
        .map_err(|source| DatasetError::Upload {
            key: key.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = DatasetConfig::default().layout();
        let keys: Vec<&str> = layout.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "folder000/tests00@0",
                "folder000/folder00/tests00",
                "folder001/tests00@1",
                "folder001/folder01/tests01",
                "folder002/tests00@2",
                "folder002/folder02/tests02",
                "zero-bytes",
                "folder000/folder00/folder-test/folder-x/folder/sample!&",
                "folder003/large-object",
            ]
        );
    }

    #[test]
    fn test_layout_always_has_zero_and_large_objects() {
        let config = DatasetConfig {
            folders: 0,
            size_policy: SizePolicy::Fixed { bytes: 1 },
            ..Default::default()
        };
        let layout = config.layout();

        assert!(layout
            .iter()
            .any(|e| e.key == ZERO_BYTES_KEY && e.size == SizePolicy::Zero));
        assert!(layout.iter().any(|e| e.size
            == SizePolicy::Fixed {
                bytes: DEFAULT_LARGE_OBJECT_BYTES
            }));
        assert!(DEFAULT_LARGE_OBJECT_BYTES > MULTIPART_THRESHOLD_BYTES);
    }

    #[test]
    fn test_layout_keys_are_unique() {
        let layout = DatasetConfig {
            folders: 12,
            ..Default::default()
        }
        .layout();
        let mut keys: Vec<&str> = layout.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), layout.len());
    }

    #[test]
    fn test_config_defaults_from_empty_object() {
        let config: DatasetConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DatasetConfig::default());
        assert_eq!(config.manifest_key, DEFAULT_MANIFEST_KEY);
    }
}
