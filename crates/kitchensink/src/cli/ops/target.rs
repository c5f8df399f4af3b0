use clap::Args;

use kitchensink::StorageDefaults;
use object_storage::{S3Storage, StorageConfig, StorageError};

use crate::cli::op::OpContext;

/// Positional connection arguments shared by every bucket command
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// S3 endpoint; `http://` disables TLS, a bare host implies https
    pub endpoint: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Bucket name
    pub bucket: String,

    /// Skip TLS certificate verification
    #[arg(long)]
    pub insecure: bool,

    /// Signing region (defaults to the config file, then "us-east-1")
    #[arg(long)]
    pub region: Option<String>,
}

impl TargetArgs {
    /// Merge the command line with config file defaults; the command line wins.
    pub fn storage_config(&self, defaults: &StorageDefaults) -> StorageConfig {
        StorageConfig {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            bucket: self.bucket.clone(),
            region: self.region.clone().or_else(|| defaults.region.clone()),
            insecure: self.insecure || defaults.insecure,
        }
    }

    pub fn connect(&self, ctx: &OpContext) -> Result<S3Storage, StorageError> {
        let config = self.storage_config(&ctx.config.storage);
        tracing::debug!(
            endpoint = %config.endpoint,
            bucket = %config.bucket,
            insecure = config.insecure,
            config_path = ?ctx.config_path,
            "connecting to object storage"
        );
        S3Storage::new(&config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetArgs {
        TargetArgs {
            endpoint: "http://localhost:9000".to_string(),
            access_key: "ak".to_string(),
            secret_key: "sk".to_string(),
            bucket: "dataset".to_string(),
            insecure: false,
            region: None,
        }
    }

    #[test]
    fn test_defaults_fill_unset_values() {
        let defaults = StorageDefaults {
            region: Some("eu-west-1".to_string()),
            insecure: true,
        };

        let config = target().storage_config(&defaults);
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert!(config.insecure);
        assert_eq!(config.bucket, "dataset");
    }

    #[test]
    fn test_command_line_wins() {
        let defaults = StorageDefaults {
            region: Some("eu-west-1".to_string()),
            insecure: false,
        };
        let args = TargetArgs {
            region: Some("ap-south-1".to_string()),
            insecure: true,
            ..target()
        };

        let config = args.storage_config(&defaults);
        assert_eq!(config.region.as_deref(), Some("ap-south-1"));
        assert!(config.insecure);
    }

    #[test]
    fn test_connect_rejects_bad_endpoint() {
        let ctx = OpContext::new(None).unwrap();
        let args = TargetArgs {
            endpoint: "ftp://localhost".to_string(),
            ..target()
        };
        assert!(matches!(
            args.connect(&ctx),
            Err(StorageError::InvalidEndpoint { .. })
        ));
    }
}
