pub mod store;

pub use store::ObjectStoreStorage;

use crate::config::StorageSettings;
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use object_store::aws::AmazonS3Builder;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key-addressed access to one bucket.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: &[u8]) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    fn bucket(&self) -> &str;
}

#[derive(Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub allow_http: bool,
}

impl From<&StorageSettings> for S3Config {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            region: settings.region.clone(),
            access_key: settings.access_key.clone(),
            secret_key: settings.secret_key.clone(),
            allow_http: settings.allow_http,
        }
    }
}

/// Hands out per-bucket S3 clients and object stores, built once and cached.
#[derive(Clone)]
pub struct S3Manager {
    pub config: S3Config,
    client_cache: Arc<dashmap::DashMap<String, Arc<S3Client>>>,
    object_store_cache: Arc<dashmap::DashMap<String, Arc<object_store::aws::AmazonS3>>>,
}

impl S3Manager {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client_cache: Arc::new(dashmap::DashMap::new()),
            object_store_cache: Arc::new(dashmap::DashMap::new()),
        }
    }

    pub fn get_client(&self, bucket: &str) -> Arc<S3Client> {
        if let Some(client) = self.client_cache.get(bucket) {
            return client.clone();
        }

        let credentials = Credentials::new(
            &self.config.access_key,
            &self.config.secret_key,
            None,
            None,
            "static",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&self.config.endpoint)
            .region(Region::new(self.config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        debug!(bucket, endpoint = %self.config.endpoint, "Creating S3 client");
        let client = Arc::new(aws_sdk_s3::Client::from_conf(s3_config));
        self.client_cache.insert(bucket.to_string(), client.clone());
        client
    }

    pub fn get_object_store(&self, bucket: &str) -> Result<Arc<object_store::aws::AmazonS3>> {
        if let Some(store) = self.object_store_cache.get(bucket) {
            return Ok(store.clone());
        }

        let s3 = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_region(&self.config.region)
            .with_access_key_id(&self.config.access_key)
            .with_secret_access_key(&self.config.secret_key)
            .with_endpoint(&self.config.endpoint)
            .with_allow_http(self.config.allow_http)
            .build()?;

        let store = Arc::new(s3);
        self.object_store_cache
            .insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    /// Storage handle for a bucket, backed by the cached object store.
    pub fn storage(&self, bucket: &str) -> Result<ObjectStoreStorage> {
        Ok(ObjectStoreStorage::new(self.get_object_store(bucket)?, bucket))
    }

    /// Verifies that a bucket exists and is accessible
    pub async fn verify_bucket_exists(&self, bucket: &str) -> Result<()> {
        let client = self.get_client(bucket);

        client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                warn!(bucket, endpoint = %self.config.endpoint, "Bucket is not accessible");
                Error::from(e)
            })?;

        debug!(bucket, "Bucket is accessible");
        Ok(())
    }
}
