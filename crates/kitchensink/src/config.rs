use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use common::content::{ContentError, SizePolicy};
use common::dataset::{DatasetConfig, MULTIPART_THRESHOLD_BYTES};

/// Settings file read when `--config` is passed.
///
/// ```toml
/// [dataset]
/// manifest_key = "kitchensink"
/// folders = 3
/// large_object_bytes = 5242887
///
/// [dataset.size_policy]
/// type = "random_prime"
/// min_bits = 2
/// max_bits = 24
///
/// [storage]
/// region = "eu-west-1"
/// insecure = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub storage: StorageDefaults,
}

/// Connection settings applied when the command line leaves them unset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDefaults {
    /// Signing region (defaults to "us-east-1")
    #[serde(default)]
    pub region: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_toml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&config_toml)?;
        config.dataset.size_policy.validate()?;

        let large_object_bytes = config.dataset.large_object_bytes;
        if large_object_bytes <= MULTIPART_THRESHOLD_BYTES {
            return Err(ConfigError::LargeObjectTooSmall {
                bytes: large_object_bytes,
                min: MULTIPART_THRESHOLD_BYTES + 1,
            });
        }
        SizePolicy::Fixed {
            bytes: large_object_bytes,
        }
        .validate()?;

        Ok(config)
    }

    /// Load `path` if given, otherwise use defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("invalid dataset settings: {0}")]
    Invalid(#[from] ContentError),

    #[error("large_object_bytes must be at least {min}, got {bytes}")]
    LargeObjectTooSmall { bytes: u64, min: u64 },
}
