//! Shared test utilities for dataset integration tests
#![allow(dead_code)]

use bytes::Bytes;
use common::content::SizePolicy;
use common::dataset::{build_dataset, BuildReport, DatasetConfig};
use object_storage::{MemoryStorage, ObjectStorage};

pub const BUCKET: &str = "kitchensink-test";

/// Route log output through the test harness; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A dataset config with small objects so tests stay fast
pub fn small_config() -> DatasetConfig {
    DatasetConfig {
        size_policy: SizePolicy::RandomPrime {
            min_bits: 2,
            max_bits: 12,
        },
        large_object_bytes: 70 * 1024 + 3,
        ..Default::default()
    }
}

/// Build the small dataset into a fresh in-memory bucket
pub async fn setup_dataset() -> (MemoryStorage, BuildReport) {
    init_tracing();
    let storage = MemoryStorage::new(BUCKET);
    let report = build_dataset(&storage, &small_config()).await.unwrap();
    (storage, report)
}

/// Download an object in full
pub async fn read_object(storage: &MemoryStorage, key: &str) -> Bytes {
    storage.get_object(key).await.unwrap().bytes().await.unwrap()
}
