//! # Verification
//!
//! Re-reads a bucket populated by [`build_dataset`](crate::dataset::build_dataset)
//! and cross-checks three independent records of every object's identity:
//!
//! 1. the digest recomputed from the downloaded bytes
//! 2. the provider tag reported by the listing
//! 3. the tag recorded in the manifest and the digest stored in the
//!    object's `content-md5` user metadata
//!
//! Disagreements are collected as [`Anomaly`] values and never abort the run.
//! A listed object that reads back as missing and a manifest entry with no
//! listed object are anomalies too. Only failures that make the check itself
//! impossible (missing or corrupt manifest, a broken listing, a failed
//! download) are returned as errors.

use std::collections::BTreeSet;
use std::fmt;

use futures::TryStreamExt;

use object_storage::{normalize_tag, ObjectStorage, ObjectSummary, StorageError};

use crate::content::{ContentDigest, StreamingDigest};
use crate::dataset::DIGEST_METADATA_KEY;
use crate::manifest::{Manifest, ManifestError};

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("manifest '{0}' not found in bucket")]
    ManifestMissing(String),
    #[error("manifest '{key}' is corrupt: {source}")]
    ManifestCorrupt {
        key: String,
        #[source]
        source: ManifestError,
    },
    #[error("failed to read manifest '{key}': {source}")]
    ManifestRead {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("listing failed after checking {checked} objects: {source}")]
    Listing {
        checked: usize,
        #[source]
        source: StorageError,
    },
    #[error("failed to download '{key}': {source}")]
    Download {
        key: String,
        #[source]
        source: StorageError,
    },
}

/// Where an expected piece of identity metadata was missing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataSource {
    /// The key has no manifest entry
    Manifest,
    /// The object has no `content-md5` user metadata
    UserMetadata,
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSource::Manifest => write!(f, "manifest entry"),
            MetadataSource::UserMetadata => write!(f, "{} metadata", DIGEST_METADATA_KEY),
        }
    }
}

/// A single disagreement found while verifying one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    /// Tag recorded in the manifest differs from the tag the provider reports now
    ManifestMismatch {
        key: String,
        recorded: String,
        tag: Option<String>,
    },
    /// Recomputed digest differs from the provider tag
    TagMismatch {
        key: String,
        digest: ContentDigest,
        tag: Option<String>,
    },
    /// Recomputed digest differs from the `content-md5` user metadata
    DigestMismatch {
        key: String,
        digest: ContentDigest,
        recorded: String,
    },
    MissingMetadata { key: String, source: MetadataSource },
    /// Listed, but the provider reports no object under that key on read
    Unreadable { key: String },
    /// Recorded in the manifest but absent from the listing
    MissingObject { key: String, recorded: String },
}

impl Anomaly {
    pub fn key(&self) -> &str {
        match self {
            Anomaly::ManifestMismatch { key, .. }
            | Anomaly::TagMismatch { key, .. }
            | Anomaly::DigestMismatch { key, .. }
            | Anomaly::MissingMetadata { key, .. }
            | Anomaly::Unreadable { key }
            | Anomaly::MissingObject { key, .. } => key,
        }
    }

    pub fn is_missing_metadata(&self) -> bool {
        matches!(self, Anomaly::MissingMetadata { .. })
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ManifestMismatch { key, recorded, tag } => write!(
                f,
                "{}: provider tag {} does not match manifest tag {}",
                key,
                tag.as_deref().unwrap_or("<none>"),
                recorded
            ),
            Anomaly::TagMismatch { key, digest, tag } => write!(
                f,
                "{}: content digest {} does not match provider tag {}",
                key,
                digest,
                tag.as_deref().unwrap_or("<none>")
            ),
            Anomaly::DigestMismatch {
                key,
                digest,
                recorded,
            } => write!(
                f,
                "{}: content digest {} does not match {} metadata {}",
                key, digest, DIGEST_METADATA_KEY, recorded
            ),
            Anomaly::MissingMetadata { key, source } => write!(f, "{}: no {}", key, source),
            Anomaly::Unreadable { key } => write!(f, "{}: listed but could not be fetched", key),
            Anomaly::MissingObject { key, recorded } => write!(
                f,
                "{}: recorded in manifest with tag {} but not listed",
                key, recorded
            ),
        }
    }
}

/// Outcome of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Objects listed and downloaded, manifest included
    pub objects_checked: usize,
    pub bytes_checked: u64,
    pub anomalies: Vec<Anomaly>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Anomalies that are disagreements rather than missing records.
    pub fn mismatch_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| !a.is_missing_metadata())
            .count()
    }

    pub fn missing_metadata_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| a.is_missing_metadata())
            .count()
    }

    pub fn anomalies_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Anomaly> + 'a {
        self.anomalies.iter().filter(move |a| a.key() == key)
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() {
            write!(
                f,
                "Successfully verified {} objects ({} bytes)",
                self.objects_checked, self.bytes_checked
            )
        } else {
            write!(
                f,
                "Verified {} objects with {} anomalies ({} mismatches, {} missing metadata)",
                self.objects_checked,
                self.anomalies.len(),
                self.mismatch_count(),
                self.missing_metadata_count()
            )
        }
    }
}

/// Download and decode the manifest stored under `key`.
pub async fn load_manifest<S>(storage: &S, key: &str) -> Result<Manifest, VerifyError>
where
    S: ObjectStorage + ?Sized,
{
    let read_error = |source: StorageError| VerifyError::ManifestRead {
        key: key.to_string(),
        source,
    };

    let download = match storage.get_object(key).await {
        Ok(download) => download,
        Err(StorageError::NotFound(_)) => {
            return Err(VerifyError::ManifestMissing(key.to_string()))
        }
        Err(e) => return Err(read_error(e)),
    };
    let bytes = download.bytes().await.map_err(read_error)?;

    Manifest::deserialize(&bytes).map_err(|source| VerifyError::ManifestCorrupt {
        key: key.to_string(),
        source,
    })
}

/// Verify every object currently in the bucket against the manifest stored
/// under `manifest_key`.
pub async fn verify_dataset<S>(storage: &S, manifest_key: &str) -> Result<VerifyReport, VerifyError>
where
    S: ObjectStorage + ?Sized,
{
    let manifest = load_manifest(storage, manifest_key).await?;
    tracing::info!(
        bucket = %storage.bucket(),
        manifest_key,
        entries = manifest.len(),
        "verifying dataset"
    );

    let mut report = VerifyReport::default();
    let mut seen = BTreeSet::new();
    let mut listing = storage.list_objects();

    loop {
        let next = listing.try_next().await;
        let object = match next {
            Ok(Some(object)) => object,
            Ok(None) => break,
            Err(source) => {
                return Err(VerifyError::Listing {
                    checked: report.objects_checked,
                    source,
                })
            }
        };

        let checked = check_object(storage, &manifest, manifest_key, &object).await?;

        for anomaly in &checked.anomalies {
            tracing::warn!(key = %object.key, "{}", anomaly);
        }
        tracing::debug!(
            key = %object.key,
            size = checked.bytes,
            anomalies = checked.anomalies.len(),
            "checked object"
        );

        report.objects_checked += 1;
        report.bytes_checked += checked.bytes;
        report.anomalies.extend(checked.anomalies);
        seen.insert(object.key);
    }

    for (key, recorded) in manifest.iter() {
        if seen.contains(key) {
            continue;
        }
        let anomaly = Anomaly::MissingObject {
            key: key.to_string(),
            recorded: recorded.to_string(),
        };
        tracing::warn!(key, "{}", anomaly);
        report.anomalies.push(anomaly);
    }

    tracing::info!(
        bucket = %storage.bucket(),
        objects = report.objects_checked,
        anomalies = report.anomalies.len(),
        "verification finished"
    );

    Ok(report)
}

struct CheckedObject {
    bytes: u64,
    anomalies: Vec<Anomaly>,
}

async fn check_object<S>(
    storage: &S,
    manifest: &Manifest,
    manifest_key: &str,
    object: &ObjectSummary,
) -> Result<CheckedObject, VerifyError>
where
    S: ObjectStorage + ?Sized,
{
    let download_error = |source: StorageError| VerifyError::Download {
        key: object.key.clone(),
        source,
    };

    let download = match storage.get_object(&object.key).await {
        Ok(download) => download,
        Err(StorageError::NotFound(_)) => {
            return Ok(CheckedObject {
                bytes: 0,
                anomalies: vec![Anomaly::Unreadable {
                    key: object.key.clone(),
                }],
            })
        }
        Err(e) => return Err(download_error(e)),
    };
    let recorded_digest = download
        .metadata_value(DIGEST_METADATA_KEY)
        .map(str::to_string);

    let mut body = download.body;
    let mut hasher = StreamingDigest::new();
    while let Some(chunk) = body.try_next().await.map_err(download_error)? {
        hasher.update(&chunk);
    }
    let bytes = hasher.bytes();
    let digest = hasher.finalize();

    let mut anomalies = Vec::new();
    let key = || object.key.clone();

    // The manifest cannot record its own tag.
    if object.key != manifest_key {
        match manifest.get(&object.key) {
            None => anomalies.push(Anomaly::MissingMetadata {
                key: key(),
                source: MetadataSource::Manifest,
            }),
            Some(recorded) if !tags_match(recorded, object.tag.as_deref()) => {
                anomalies.push(Anomaly::ManifestMismatch {
                    key: key(),
                    recorded: recorded.to_string(),
                    tag: object.tag.clone(),
                })
            }
            Some(_) => {}
        }

        let tag_matches = object
            .tag
            .as_deref()
            .is_some_and(|tag| digest.matches_tag(tag));
        if !tag_matches {
            anomalies.push(Anomaly::TagMismatch {
                key: key(),
                digest,
                tag: object.tag.clone(),
            });
        }
    }

    match recorded_digest {
        None => anomalies.push(Anomaly::MissingMetadata {
            key: key(),
            source: MetadataSource::UserMetadata,
        }),
        Some(recorded) if normalize_tag(&recorded) != digest.to_hex() => {
            anomalies.push(Anomaly::DigestMismatch {
                key: key(),
                digest,
                recorded,
            })
        }
        Some(_) => {}
    }

    Ok(CheckedObject { bytes, anomalies })
}

fn tags_match(recorded: &str, current: Option<&str>) -> bool {
    current.is_some_and(|tag| normalize_tag(tag) == normalize_tag(recorded))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> ContentDigest {
        ContentDigest::of(b"hello")
    }

    #[test]
    fn test_tags_match_ignores_quotes_and_case() {
        assert!(tags_match(
            "\"5D41402ABC4B2A76B9719D911017C592\"",
            Some("5d41402abc4b2a76b9719d911017c592")
        ));
        assert!(!tags_match("\"abc\"", Some("\"abd\"")));
        assert!(!tags_match("\"abc\"", None));
    }

    #[test]
    fn test_report_counts() {
        let report = VerifyReport {
            objects_checked: 3,
            bytes_checked: 10,
            anomalies: vec![
                Anomaly::TagMismatch {
                    key: "a".to_string(),
                    digest: digest(),
                    tag: None,
                },
                Anomaly::MissingMetadata {
                    key: "b".to_string(),
                    source: MetadataSource::Manifest,
                },
                Anomaly::MissingMetadata {
                    key: "b".to_string(),
                    source: MetadataSource::UserMetadata,
                },
            ],
        };

        assert!(!report.is_clean());
        assert_eq!(report.mismatch_count(), 1);
        assert_eq!(report.missing_metadata_count(), 2);
        assert_eq!(report.anomalies_for("b").count(), 2);
        assert_eq!(report.anomalies_for("c").count(), 0);
    }

    #[test]
    fn test_report_display() {
        let clean = VerifyReport {
            objects_checked: 10,
            bytes_checked: 42,
            anomalies: vec![],
        };
        assert_eq!(
            clean.to_string(),
            "Successfully verified 10 objects (42 bytes)"
        );

        let dirty = VerifyReport {
            objects_checked: 2,
            bytes_checked: 5,
            anomalies: vec![Anomaly::DigestMismatch {
                key: "x".to_string(),
                digest: digest(),
                recorded: "00".to_string(),
            }],
        };
        assert!(dirty.to_string().contains("1 anomalies"));
    }

    #[test]
    fn test_unreadable_and_missing_objects_count_as_mismatches() {
        let report = VerifyReport {
            objects_checked: 1,
            bytes_checked: 0,
            anomalies: vec![
                Anomaly::Unreadable {
                    key: "logs/".to_string(),
                },
                Anomaly::MissingObject {
                    key: "folder001/tests00@1".to_string(),
                    recorded: "\"abc\"".to_string(),
                },
            ],
        };
        assert_eq!(report.mismatch_count(), 2);
        assert_eq!(report.missing_metadata_count(), 0);
        assert_eq!(
            report.anomalies[0].to_string(),
            "logs/: listed but could not be fetched"
        );
        assert_eq!(report.anomalies_for("folder001/tests00@1").count(), 1);
    }

    #[test]
    fn test_anomaly_display_names_key() {
        let anomaly = Anomaly::MissingMetadata {
            key: "folder000/tests00@0".to_string(),
            source: MetadataSource::UserMetadata,
        };
        assert_eq!(
            anomaly.to_string(),
            "folder000/tests00@0: no content-md5 metadata"
        );
    }
}
