//! # Content
//!
//! Random payload generation with a digest computed in the same pass.
//!
//! Payload bytes come from the operating system's cryptographic RNG and are
//! fed to an MD5 hasher chunk by chunk as they are produced, so the payload
//! is never re-read to compute its digest. MD5 is used because a single-part
//! S3 upload's ETag is the MD5 of its body, which makes the provider's tag
//! directly comparable with the digest.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use md5::{Digest, Md5};
use rand::rngs::OsRng;
use rand::{Rng, TryRngCore};
use serde::{Deserialize, Serialize};

use object_storage::normalize_tag;

/// Size of an MD5 digest in bytes
pub const DIGEST_SIZE: usize = 16;
/// Bytes drawn from the RNG (and hashed) per step
pub const GENERATE_CHUNK_SIZE: usize = 64 * 1024;

pub const DEFAULT_MIN_PRIME_BITS: u32 = 2;
pub const DEFAULT_MAX_PRIME_BITS: u32 = 24;
/// Upper bound on prime bit widths; keeps payloads under 4 GiB
pub const MAX_PRIME_BITS: u32 = 32;
/// Largest payload any policy may request
pub const MAX_PAYLOAD_BYTES: u64 = 1 << MAX_PRIME_BITS;

/// Errors that can occur while generating content
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// The OS entropy source failed; the run cannot continue
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("invalid size policy: {0}")]
    InvalidSizePolicy(String),
    #[error("payload of {0} bytes cannot be held in memory")]
    TooLarge(u64),
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

/// How large a generated payload should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizePolicy {
    /// An empty payload
    Zero,
    /// Exactly `bytes` bytes
    Fixed { bytes: u64 },
    /// A random prime number of bytes, whose bit length is drawn
    ///  uniformly from `min_bits..=max_bits`
    RandomPrime { min_bits: u32, max_bits: u32 },
}

impl Default for SizePolicy {
    fn default() -> Self {
        SizePolicy::RandomPrime {
            min_bits: DEFAULT_MIN_PRIME_BITS,
            max_bits: DEFAULT_MAX_PRIME_BITS,
        }
    }
}

impl SizePolicy {
    pub fn validate(&self) -> Result<(), ContentError> {
        match *self {
            SizePolicy::Zero => Ok(()),
            SizePolicy::Fixed { bytes } if bytes > MAX_PAYLOAD_BYTES => {
                Err(ContentError::TooLarge(bytes))
            }
            SizePolicy::Fixed { .. } => Ok(()),
            SizePolicy::RandomPrime { min_bits, max_bits } => {
                if min_bits < 2 {
                    return Err(ContentError::InvalidSizePolicy(format!(
                        "min_bits must be at least 2, got {}",
                        min_bits
                    )));
                }
                if max_bits > MAX_PRIME_BITS {
                    return Err(ContentError::InvalidSizePolicy(format!(
                        "max_bits must be at most {}, got {}",
                        MAX_PRIME_BITS, max_bits
                    )));
                }
                if min_bits > max_bits {
                    return Err(ContentError::InvalidSizePolicy(format!(
                        "min_bits ({}) exceeds max_bits ({})",
                        min_bits, max_bits
                    )));
                }
                Ok(())
            }
        }
    }

    /// Pick a concrete payload size under this policy.
    pub fn choose_size(&self) -> Result<u64, ContentError> {
        self.validate()?;
        match *self {
            SizePolicy::Zero => Ok(0),
            SizePolicy::Fixed { bytes } => Ok(bytes),
            SizePolicy::RandomPrime { min_bits, max_bits } => {
                let bits = rand::rng().random_range(min_bits..=max_bits);
                random_prime(bits).ok_or_else(|| {
                    ContentError::InvalidSizePolicy(format!("no prime with {} bits", bits))
                })
            }
        }
    }
}

/// A random prime in `[2^(bits-1), 2^bits)`.
///
/// Scans upward from a random start, wrapping to the bottom of the range;
/// Bertrand's postulate guarantees the range holds a prime for `bits >= 2`.
fn random_prime(bits: u32) -> Option<u64> {
    if !(2..=MAX_PRIME_BITS).contains(&bits) {
        return None;
    }
    let low = 1u64 << (bits - 1);
    let high = (1u64 << bits) - 1;
    let start = rand::rng().random_range(low..=high);
    (start..=high).chain(low..start).find(|n| is_prime(*n))
}

/// Trial division; sizes stay below 2^32.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// MD5 digest of a payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_SIZE]);

impl ContentDigest {
    /// Digest a complete buffer.
    pub fn of(data: &[u8]) -> Self {
        let mut digest = StreamingDigest::new();
        digest.update(data);
        digest.finalize()
    }

    pub fn from_hex(hex: &str) -> Result<Self, ContentError> {
        let mut buff = [0; DIGEST_SIZE];
        hex::decode_to_slice(hex.trim(), &mut buff)
            .map_err(|e| ContentError::InvalidDigest(format!("{}: {}", hex, e)))?;
        Ok(Self(buff))
    }

    /// Lowercase hex, the form stored in object metadata.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Whether a provider tag (ETag, possibly quoted) names this digest.
    pub fn matches_tag(&self, tag: &str) -> bool {
        normalize_tag(tag) == self.to_hex()
    }
}

impl From<[u8; DIGEST_SIZE]> for ContentDigest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Incremental digest over a sequence of chunks.
#[derive(Clone, Default)]
pub struct StreamingDigest {
    hasher: Md5,
    bytes: u64,
}

impl StreamingDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> ContentDigest {
        ContentDigest(self.hasher.finalize().into())
    }
}

/// A generated payload with the digest of its exact bytes.
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub payload: Bytes,
    pub digest: ContentDigest,
}

impl GeneratedContent {
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Generate a payload sized by `policy`.
pub fn generate(policy: &SizePolicy) -> Result<GeneratedContent, ContentError> {
    let size = policy.choose_size()?;
    generate_exact(size)
}

/// Generate exactly `size` random bytes, hashing them as they are drawn.
pub fn generate_exact(size: u64) -> Result<GeneratedContent, ContentError> {
    let requested = size;
    let size = usize::try_from(size).map_err(|_| ContentError::TooLarge(requested))?;

    let mut payload = Vec::new();
    payload
        .try_reserve_exact(size)
        .map_err(|_| ContentError::TooLarge(requested))?;
    let mut digest = StreamingDigest::new();
    let mut chunk = vec![0u8; GENERATE_CHUNK_SIZE.min(size)];

    let mut remaining = size;
    while remaining > 0 {
        let n = remaining.min(GENERATE_CHUNK_SIZE);
        let buf = &mut chunk[..n];
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| ContentError::Entropy(e.to_string()))?;
        digest.update(buf);
        payload.extend_from_slice(buf);
        remaining -= n;
    }

    Ok(GeneratedContent {
        payload: Bytes::from(payload),
        digest: digest.finalize(),
    })
}
