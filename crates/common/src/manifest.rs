//! # Manifest
//!
//! The manifest records, for one dataset build, the provider tag (ETag)
//! returned for every uploaded object. It is written into the bucket as a
//! single object under a reserved key once all other uploads succeed, and
//! read back wholesale at the start of verification.
//!
//! ## Wire format
//!
//! A JSON object mapping object keys to tags, keys in sorted order:
//!
//! ```json
//! {"folder000/tests00@0":"\"5d41402abc4b2a76b9719d911017c592\"","zero-bytes":"..."}
//! ```
//!
//! There is no schema version field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed manifest: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode manifest: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Mapping of object key to the provider tag recorded at upload time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) the tag for `key`.
    ///
    /// Only call this once the provider has acknowledged the upload.
    pub fn record(&mut self, key: impl Into<String>, tag: impl Into<String>) {
        self.entries.insert(key.into(), tag.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encode to the bytes stored under the reserved key.
    ///
    /// Output is deterministic: equal manifests always encode identically.
    pub fn serialize(&self) -> Result<Vec<u8>, ManifestError> {
        serde_json::to_vec(self).map_err(ManifestError::Encode)
    }

    /// Decode bytes previously produced by [`Manifest::serialize`].
    pub fn deserialize(bytes: &[u8]) -> Result<Self, ManifestError> {
        serde_json::from_slice(bytes).map_err(ManifestError::Malformed)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Manifest {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut manifest = Manifest::new();
        for (key, tag) in iter {
            manifest.record(key, tag);
        }
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let mut manifest = Manifest::new();
        manifest.record("a", "\"tag-a\"");
        manifest.record("b", "\"tag-b\"");
        manifest.record("a", "\"tag-a2\"");

        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.get("a"), Some("\"tag-a2\""));
        assert_eq!(manifest.get("missing"), None);
    }

    #[test]
    fn test_roundtrip_empty() {
        let manifest = Manifest::new();
        let bytes = manifest.serialize().unwrap();
        assert_eq!(bytes, b"{}");
        assert_eq!(Manifest::deserialize(&bytes).unwrap(), manifest);
    }

    #[test]
    fn test_roundtrip_special_characters() {
        let manifest: Manifest = [
            ("folder000/folder00/folder-test/folder-x/folder/sample!&", "\"0f\""),
            ("folder001/tests00@1", "\"1a\""),
            ("quote\"and\\backslash", "tag"),
            ("unicodé/ключ", "\"9c-2\""),
            ("zero-bytes", "\"d41d8cd98f00b204e9800998ecf8427e\""),
        ]
        .into_iter()
        .collect();

        let bytes = manifest.serialize().unwrap();
        assert_eq!(Manifest::deserialize(&bytes).unwrap(), manifest);
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let forward: Manifest = [("b", "2"), ("a", "1"), ("c", "3")].into_iter().collect();
        let backward: Manifest = [("c", "3"), ("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(forward.serialize().unwrap(), backward.serialize().unwrap());
        assert_eq!(
            String::from_utf8(forward.serialize().unwrap()).unwrap(),
            r#"{"a":"1","b":"2","c":"3"}"#
        );
    }

    #[test]
    fn test_reads_plain_json_object() {
        let manifest = Manifest::deserialize(br#"{"x/y":"abc"}"#).unwrap();
        assert_eq!(manifest.get("x/y"), Some("abc"));
    }

    #[test]
    fn test_malformed_bytes() {
        let cases: [&[u8]; 4] = [b"not json", b"[1,2,3]", b"{\"a\": 1}", b""];
        for bytes in cases {
            assert!(matches!(
                Manifest::deserialize(bytes),
                Err(ManifestError::Malformed(_))
            ));
        }
    }
}
