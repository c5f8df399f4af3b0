//! Integration tests for dataset creation

mod common;

use bytes::Bytes;
use futures::TryStreamExt;

use ::common::content::{is_prime, ContentDigest, ContentError, SizePolicy, MAX_PAYLOAD_BYTES};
use ::common::dataset::{
    build_dataset, DatasetConfig, DatasetError, DEFAULT_LARGE_OBJECT_BYTES, DEFAULT_MANIFEST_KEY,
    DIGEST_METADATA_KEY, ZERO_BYTES_KEY,
};
use ::common::manifest::Manifest;
use object_storage::{
    normalize_tag, MemoryStorage, ObjectStorage, ObjectSummary, CONTENT_TYPE_OCTET_STREAM,
};

async fn listing(storage: &MemoryStorage) -> Vec<ObjectSummary> {
    storage.list_objects().try_collect().await.unwrap()
}

#[tokio::test]
async fn test_create_uploads_layout_and_manifest() {
    let (storage, report) = common::setup_dataset().await;
    let layout = common::small_config().layout();

    assert!(report.bucket_created);
    assert!(storage.bucket_exists());
    assert_eq!(report.objects, layout.len());
    assert_eq!(storage.len(), layout.len() + 1);
    assert!(storage.contains(DEFAULT_MANIFEST_KEY));

    for entry in &layout {
        assert!(storage.contains(&entry.key), "missing {}", entry.key);
        assert!(report.manifest.contains(&entry.key));
    }
    assert!(!report.manifest.contains(DEFAULT_MANIFEST_KEY));
}

#[tokio::test]
async fn test_manifest_in_bucket_matches_listing_tags() {
    let (storage, report) = common::setup_dataset().await;

    let stored = common::read_object(&storage, DEFAULT_MANIFEST_KEY).await;
    let manifest = Manifest::deserialize(&stored).unwrap();
    assert_eq!(manifest, report.manifest);

    for object in listing(&storage).await {
        if object.key == DEFAULT_MANIFEST_KEY {
            continue;
        }
        let recorded = manifest.get(&object.key).unwrap();
        let tag = object.tag.unwrap();
        assert_eq!(normalize_tag(recorded), normalize_tag(&tag));
    }
}

#[tokio::test]
async fn test_every_object_carries_its_digest() {
    let (storage, _) = common::setup_dataset().await;

    for key in storage.keys() {
        let download = storage.get_object(&key).await.unwrap();
        let recorded = download
            .metadata_value(DIGEST_METADATA_KEY)
            .unwrap()
            .to_string();
        let payload = download.bytes().await.unwrap();

        assert_eq!(recorded, ContentDigest::of(&payload).to_hex(), "{}", key);
        assert_eq!(
            storage.content_type(&key).as_deref(),
            Some(CONTENT_TYPE_OCTET_STREAM)
        );
    }
}

#[tokio::test]
async fn test_object_sizes() {
    let (storage, report) = common::setup_dataset().await;
    let config = common::small_config();

    let mut total = 0;
    for object in listing(&storage).await {
        if object.key == DEFAULT_MANIFEST_KEY {
            continue;
        }
        total += object.size;

        if object.key == ZERO_BYTES_KEY {
            assert_eq!(object.size, 0);
        } else if object.key.ends_with("large-object") {
            assert_eq!(object.size, config.large_object_bytes);
        } else {
            assert!(is_prime(object.size), "{} has size {}", object.key, object.size);
            assert!(object.size < 1 << 12);
        }
    }
    assert_eq!(report.total_bytes, total);
}

#[tokio::test]
async fn test_default_large_object_crosses_multipart_threshold() {
    common::init_tracing();
    let storage = MemoryStorage::with_bucket(common::BUCKET);
    let config = DatasetConfig {
        size_policy: SizePolicy::Fixed { bytes: 3 },
        ..Default::default()
    };

    let report = build_dataset(&storage, &config).await.unwrap();
    assert!(!report.bucket_created);

    let large = common::read_object(&storage, "folder003/large-object").await;
    assert_eq!(large.len() as u64, DEFAULT_LARGE_OBJECT_BYTES);
    assert!(large.len() > 5 * 1024 * 1024);
}

#[tokio::test]
async fn test_payloads_differ_between_objects() {
    let storage = MemoryStorage::with_bucket(common::BUCKET);
    let config = DatasetConfig {
        size_policy: SizePolicy::Fixed { bytes: 64 },
        large_object_bytes: 64,
        ..Default::default()
    };
    build_dataset(&storage, &config).await.unwrap();

    let mut payloads: Vec<Bytes> = Vec::new();
    for entry in config.layout() {
        payloads.push(common::read_object(&storage, &entry.key).await);
    }
    payloads.retain(|p| !p.is_empty());
    let total = payloads.len();
    payloads.sort();
    payloads.dedup();
    assert_eq!(payloads.len(), total);
}

#[tokio::test]
async fn test_custom_manifest_key() {
    let storage = MemoryStorage::new(common::BUCKET);
    let config = DatasetConfig {
        manifest_key: "manifests/run-1.json".to_string(),
        ..common::small_config()
    };

    let report = build_dataset(&storage, &config).await.unwrap();
    assert_eq!(report.manifest_key, "manifests/run-1.json");
    assert!(storage.contains("manifests/run-1.json"));
    assert!(!storage.contains(DEFAULT_MANIFEST_KEY));
}

#[tokio::test]
async fn test_failed_upload_aborts_without_manifest() {
    let storage = MemoryStorage::new(common::BUCKET);
    storage.fail_put(ZERO_BYTES_KEY);

    let err = build_dataset(&storage, &common::small_config())
        .await
        .unwrap_err();

    match err {
        DatasetError::Upload { key, .. } => assert_eq!(key, ZERO_BYTES_KEY),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!storage.contains(DEFAULT_MANIFEST_KEY));
    assert!(!storage.contains(ZERO_BYTES_KEY));

    // Six folder objects made it before the failing seventh upload
    assert_eq!(storage.len(), 6);
    assert_eq!(storage.put_calls(), 7);
}

#[tokio::test]
async fn test_failed_manifest_upload_is_reported() {
    let storage = MemoryStorage::new(common::BUCKET);
    storage.fail_put(DEFAULT_MANIFEST_KEY);

    let err = build_dataset(&storage, &common::small_config())
        .await
        .unwrap_err();
    assert!(matches!(err, DatasetError::Upload { ref key, .. } if key == DEFAULT_MANIFEST_KEY));
    assert!(!storage.contains(DEFAULT_MANIFEST_KEY));
}

#[tokio::test]
async fn test_manifest_key_must_not_collide_with_layout() {
    let storage = MemoryStorage::new(common::BUCKET);
    let config = DatasetConfig {
        manifest_key: ZERO_BYTES_KEY.to_string(),
        ..common::small_config()
    };

    let err = build_dataset(&storage, &config).await.unwrap_err();
    assert!(matches!(err, DatasetError::ReservedKey(_)));
    assert!(!storage.bucket_exists());
    assert_eq!(storage.put_calls(), 0);
}

#[tokio::test]
async fn test_invalid_size_policy_is_rejected_before_upload() {
    let storage = MemoryStorage::new(common::BUCKET);
    let config = DatasetConfig {
        size_policy: SizePolicy::RandomPrime {
            min_bits: 10,
            max_bits: 4,
        },
        ..common::small_config()
    };

    let err = build_dataset(&storage, &config).await.unwrap_err();
    assert!(matches!(err, DatasetError::Content(_)));
    assert!(!storage.bucket_exists());
}

#[tokio::test]
async fn test_oversized_large_object_is_rejected_before_upload() {
    let storage = MemoryStorage::new(common::BUCKET);
    let config = DatasetConfig {
        large_object_bytes: MAX_PAYLOAD_BYTES + 1,
        ..common::small_config()
    };

    let err = build_dataset(&storage, &config).await.unwrap_err();
    assert!(matches!(
        err,
        DatasetError::Content(ContentError::TooLarge(n)) if n == MAX_PAYLOAD_BYTES + 1
    ));
    assert!(!storage.bucket_exists());
    assert_eq!(storage.put_calls(), 0);
}

#[tokio::test]
async fn test_rebuild_overwrites_dataset() {
    let (storage, first) = common::setup_dataset().await;
    let second = build_dataset(&storage, &common::small_config())
        .await
        .unwrap();

    assert!(!second.bucket_created);
    assert_eq!(storage.len(), first.objects + 1);
    assert_ne!(first.manifest, second.manifest);

    let stored = common::read_object(&storage, DEFAULT_MANIFEST_KEY).await;
    assert_eq!(Manifest::deserialize(&stored).unwrap(), second.manifest);
}
