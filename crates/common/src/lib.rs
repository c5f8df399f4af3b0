/**
 * Random object payloads and their digests.
 *  - Size policies (zero, fixed, random prime)
 *  - MD5 content digests, one-shot and streaming
 */
pub mod content;
/**
 * The fixed set of keys written to a bucket,
 *  and the build that uploads them along with
 *  their manifest.
 */
pub mod dataset;
/**
 * Key to provider tag mapping recorded during
 *  a build and stored in the bucket itself.
 */
pub mod manifest;
/**
 * Deletion of every object in a bucket.
 */
pub mod purge;
/**
 * Cross-checking of recomputed digests, provider
 *  tags, the manifest and per-object metadata.
 */
pub mod verify;

pub mod prelude {
    pub use crate::content::{ContentDigest, SizePolicy};
    pub use crate::dataset::{build_dataset, BuildReport, DatasetConfig, DatasetError};
    pub use crate::manifest::Manifest;
    pub use crate::purge::{purge_bucket, PurgeError, PurgeReport};
    pub use crate::verify::{verify_dataset, Anomaly, MetadataSource, VerifyError, VerifyReport};
}
