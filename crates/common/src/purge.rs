//! Removal of every object in a bucket, manifest included.
//!
//! Deletion is sequential and stops at the first failure. The bucket itself
//! is left in place. A delete can succeed without removing anything when the
//! client rewrites the key, so the bucket is listed again once the first
//! pass drains and any survivors fail the purge.

use futures::TryStreamExt;

use object_storage::{ObjectStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum PurgeError {
    #[error("listing failed after deleting {deleted} objects: {source}")]
    Listing {
        deleted: usize,
        #[source]
        source: StorageError,
    },
    #[error("failed to delete '{key}' after deleting {deleted} objects: {source}")]
    Delete {
        key: String,
        deleted: usize,
        #[source]
        source: StorageError,
    },
    #[error("{remaining} objects still listed after deleting {deleted}")]
    Incomplete { deleted: usize, remaining: usize },
}

impl PurgeError {
    /// Objects removed before the failure.
    pub fn deleted(&self) -> usize {
        match self {
            PurgeError::Listing { deleted, .. }
            | PurgeError::Delete { deleted, .. }
            | PurgeError::Incomplete { deleted, .. } => *deleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub bucket: String,
    pub deleted: usize,
}

impl std::fmt::Display for PurgeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deleted {} objects from bucket {}", self.deleted, self.bucket)
    }
}

/// Delete every object the listing yields.
pub async fn purge_bucket<S>(storage: &S) -> Result<PurgeReport, PurgeError>
where
    S: ObjectStorage + ?Sized,
{
    tracing::info!(bucket = %storage.bucket(), "purging bucket");

    let mut deleted = 0usize;
    let mut listing = storage.list_objects();

    loop {
        let object = match listing.try_next().await {
            Ok(Some(object)) => object,
            Ok(None) => break,
            Err(source) => return Err(PurgeError::Listing { deleted, source }),
        };

        if let Err(source) = storage.delete_object(&object.key).await {
            tracing::error!(key = %object.key, deleted, "delete failed");
            return Err(PurgeError::Delete {
                key: object.key,
                deleted,
                source,
            });
        }

        tracing::debug!(key = %object.key, "deleted object");
        deleted += 1;
    }

    let remaining = storage
        .list_objects()
        .try_fold(0usize, |count, _| async move { Ok::<_, StorageError>(count + 1) })
        .await
        .map_err(|source| PurgeError::Listing { deleted, source })?;
    if remaining > 0 {
        tracing::error!(bucket = %storage.bucket(), deleted, remaining, "objects survived purge");
        return Err(PurgeError::Incomplete { deleted, remaining });
    }

    tracing::info!(bucket = %storage.bucket(), deleted, "bucket purged");

    Ok(PurgeReport {
        bucket: storage.bucket().to_string(),
        deleted,
    })
}
