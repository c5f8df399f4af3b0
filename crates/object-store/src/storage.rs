//! S3-compatible storage backend (AWS S3, MinIO, etc.).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::{Result, StorageError};
use crate::provider::{
    not_found, ObjectDownload, ObjectStorage, ObjectSummary, PutReceipt, UserMetadata,
};

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Lifetime of the presigned URL used to create a bucket.
const CREATE_BUCKET_URL_TTL: Duration = Duration::from_secs(60);

/// Connection settings for an S3-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL (e.g., "http://localhost:9000" for MinIO);
    ///  `http://` disables TLS
    pub endpoint: String,
    /// Access key ID
    pub access_key: String,
    /// Secret access key
    pub secret_key: String,
    /// Bucket name
    pub bucket: String,
    /// Optional region (defaults to "us-east-1")
    #[serde(default)]
    pub region: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
}

/// Object storage bound to one bucket of an S3-compatible provider.
#[derive(Debug, Clone)]
pub struct S3Storage {
    inner: Arc<AmazonS3>,
    http: reqwest::Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new storage backend from configuration.
    ///
    /// No request is made until the first operation.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(&config.endpoint)?;

        if config.bucket.is_empty() {
            return Err(StorageError::InvalidConfig("bucket name is empty".into()));
        }

        let client_options =
            ClientOptions::new().with_allow_invalid_certificates(config.insecure);

        let inner = AmazonS3Builder::new()
            .with_endpoint(endpoint.as_str())
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_bucket_name(&config.bucket)
            .with_region(config.region.as_deref().unwrap_or(DEFAULT_REGION))
            .with_allow_http(!endpoint.is_tls())
            .with_virtual_hosted_style_request(false)
            .with_client_options(client_options)
            .build()
            .map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        tracing::debug!(
            endpoint = %endpoint,
            bucket = %config.bucket,
            insecure = config.insecure,
            "configured s3 storage"
        );

        Ok(Self {
            inner: Arc::new(inner),
            http,
            bucket: config.bucket.clone(),
        })
    }

    /// Build the object path for a key.
    fn object_path(key: &str) -> Result<ObjectPath> {
        ObjectPath::parse(key).map_err(|_| StorageError::InvalidKey(key.to_string()))
    }

    /// Check whether the bucket exists by listing (empty prefix).
    async fn bucket_exists(&self) -> Result<bool> {
        let mut stream = self.inner.list(None);
        match stream.try_next().await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => {
                // Some providers surface a missing bucket as a generic error
                let msg = e.to_string();
                if msg.contains("NoSuchBucket") {
                    return Ok(false);
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn create_bucket_if_absent(&self) -> Result<bool> {
        if self.bucket_exists().await? {
            return Ok(false);
        }

        // object_store has no bucket API; sign a PUT on the bucket root instead.
        let url = self
            .inner
            .signed_url(Method::PUT, &ObjectPath::from(""), CREATE_BUCKET_URL_TTL)
            .await?;
        let response = self.http.put(url).send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(bucket = %self.bucket, "created bucket");
                Ok(true)
            }
            // BucketAlreadyOwnedByYou
            StatusCode::CONFLICT => Ok(false),
            status => Err(StorageError::CreateBucket {
                bucket: self.bucket.clone(),
                status: status.as_u16(),
            }),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        payload: Bytes,
        content_type: &str,
        metadata: &UserMetadata,
    ) -> Result<PutReceipt> {
        let path = Self::object_path(key)?;

        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        for (name, value) in metadata {
            attributes.insert(
                Attribute::Metadata(name.clone().into()),
                AttributeValue::from(value.clone()),
            );
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result = self
            .inner
            .put_opts(&path, PutPayload::from(payload), options)
            .await?;

        Ok(PutReceipt {
            key: key.to_string(),
            tag: result.e_tag,
        })
    }

    async fn get_object(&self, key: &str) -> Result<ObjectDownload> {
        let path = Self::object_path(key)?;
        let result = match self.inner.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Err(not_found(key)),
            Err(e) => return Err(e.into()),
        };

        let metadata = result
            .attributes
            .iter()
            .filter_map(|(attribute, value)| match attribute {
                Attribute::Metadata(name) => {
                    let value: &str = value.as_ref();
                    Some((name.to_ascii_lowercase(), value.to_string()))
                }
                _ => None,
            })
            .collect();

        let body = result.into_stream().map_err(StorageError::from).boxed();

        Ok(ObjectDownload { metadata, body })
    }

    fn list_objects(&self) -> BoxStream<'_, Result<ObjectSummary>> {
        self.inner
            .list(None)
            .map(|item| -> Result<ObjectSummary> {
                let meta = item?;
                Ok(ObjectSummary {
                    key: meta.location.to_string(),
                    size: meta.size as u64,
                    tag: meta.e_tag,
                })
            })
            .boxed()
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = Self::object_path(key)?;
        self.inner.delete(&path).await?;
        Ok(())
    }
}
