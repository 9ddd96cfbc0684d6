//! S3-backed [`ObjectStore`].
//!
//! Credentials are static (taken from [`StorageSettings`]); no credential chain or
//! profile lookup happens. Setting an endpoint switches to path-style addressing so
//! S3-compatible servers work too.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use creative_pipeline_core::contract::ObjectStore;
use creative_pipeline_core::error::StoreError;
use tracing::{debug, error, info};

use crate::load_config::StorageSettings;

pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "static",
        );
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        info!(bucket = %settings.bucket, region = %settings.region, "S3 store initialised");
        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                error!(key, error = ?e, "S3 upload failed");
                StoreError::Upload {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            })?;
        info!(key, size, content_type, "Uploaded object to S3");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false) => {
                debug!(key, "Object not found in S3");
                Ok(false)
            }
            Err(e) => {
                error!(key, error = ?e, "S3 head_object failed");
                Err(StoreError::Lookup {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    async fn presigned_get(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let presign_err = |message: String| StoreError::Presign {
            key: key.to_string(),
            message,
        };
        let config = PresigningConfig::expires_in(ttl).map_err(|e| presign_err(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| {
                error!(key, error = ?e, "Failed to presign S3 object");
                presign_err(e.to_string())
            })?;
        debug!(key, ttl_secs = ttl.as_secs(), "Presigned retrieval link");
        Ok(request.uri().to_string())
    }

    async fn list(&self, prefix: &str, max_results: usize) -> Result<Vec<String>, StoreError> {
        let max_keys = i32::try_from(max_results).unwrap_or(i32::MAX);
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(|e| {
                error!(prefix, error = ?e, "S3 list_objects_v2 failed");
                StoreError::List {
                    prefix: prefix.to_string(),
                    message: e.to_string(),
                }
            })?;
        let keys: Vec<String> = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        debug!(prefix, found = keys.len(), "Listed S3 objects");
        Ok(keys)
    }
}
