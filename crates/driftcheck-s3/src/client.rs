//! [`ObjectStoreClient`] implementation over `aws-sdk-s3`.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use driftcheck_core::config::HarnessConfig;
use driftcheck_core::store::{ObjectStoreClient, PutObject, StoreError, StoreResult};
use driftcheck_core::types::{ObjectKey, ObservedMetadata, ObservedObject};
use tracing::debug;

use crate::error::classify;

/// Build an S3 client from harness configuration.
///
/// Credentials come from the default provider chain unless `credentials` is
/// given (local emulators accept any static pair).
pub async fn build_client(config: &HarnessConfig, credentials: Option<Credentials>) -> Client {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
    if let Some(credentials) = credentials {
        loader = loader.credentials_provider(credentials);
    }
    let shared = loader.load().await;

    let mut builder =
        aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
    if let Some(url) = &config.endpoint_url {
        builder = builder.endpoint_url(url);
    }
    Client::from_conf(builder.build())
}

/// Object store backed by an S3 (or S3-compatible) endpoint.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Wrap an existing client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a store from harness configuration.
    pub async fn from_config(config: &HarnessConfig) -> Self {
        Self::new(build_client(config, None).await)
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_owned)
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    async fn list(&self, bucket: &str) -> StoreResult<Vec<ObjectKey>> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| classify("ListObjectsV2", bucket, None, &e))?;
        let keys: Vec<ObjectKey> = resp
            .contents()
            .iter()
            .filter_map(|o| o.key().map(ObjectKey::new))
            .collect();
        debug!(bucket = %bucket, count = keys.len(), truncated = ?resp.is_truncated(), "listed objects");
        Ok(keys)
    }

    async fn head(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify("HeadObject", bucket, Some(key), &e))?;
        Ok(ObservedObject {
            metadata: ObservedMetadata {
                content_type: owned(resp.content_type()),
                cache_control: owned(resp.cache_control()),
                content_disposition: owned(resp.content_disposition()),
                content_encoding: owned(resp.content_encoding()),
                content_language: owned(resp.content_language()),
            },
            body: None,
            etag: owned(resp.e_tag()),
        })
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify("GetObject", bucket, Some(key), &e))?;
        let metadata = ObservedMetadata {
            content_type: owned(resp.content_type()),
            cache_control: owned(resp.cache_control()),
            content_disposition: owned(resp.content_disposition()),
            content_encoding: owned(resp.content_encoding()),
            content_language: owned(resp.content_language()),
        };
        let etag = owned(resp.e_tag());
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Service {
                operation: "GetObject",
                message: format!("failed to read body of {key}: {e}"),
            })?
            .into_bytes();
        Ok(ObservedObject {
            metadata,
            body: Some(body),
            etag,
        })
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, object: PutObject) -> StoreResult<()> {
        let PutObject { body, metadata } = object;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key.as_str())
            .body(ByteStream::from(body))
            .set_content_type(metadata.content_type)
            .set_cache_control(metadata.cache_control)
            .set_content_disposition(metadata.content_disposition)
            .set_content_encoding(metadata.content_encoding)
            .set_content_language(metadata.content_language)
            .send()
            .await
            .map_err(|e| classify("PutObject", bucket, Some(key), &e))?;
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        source: &ObjectKey,
        destination: &ObjectKey,
    ) -> StoreResult<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(format!("{bucket}/{}", urlencoding::encode(source.as_str())))
            .key(destination.as_str())
            .send()
            .await
            .map_err(|e| classify("CopyObject", bucket, Some(source), &e))?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| classify("DeleteObject", bucket, Some(key), &e))?;
        Ok(())
    }

    async fn delete_many(&self, bucket: &str, keys: &[ObjectKey]) -> StoreResult<()> {
        let build_error = |e: aws_sdk_s3::error::BuildError| StoreError::Service {
            operation: "DeleteObjects",
            message: e.to_string(),
        };
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k.as_str()).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(build_error)?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(build_error)?;

        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify("DeleteObjects", bucket, None, &e))?;

        if let Some(first) = resp.errors().first() {
            return Err(StoreError::Service {
                operation: "DeleteObjects",
                message: format!(
                    "{} of {} deletions failed, first: {} ({})",
                    resp.errors().len(),
                    keys.len(),
                    first.key().unwrap_or_default(),
                    first.message().unwrap_or_default()
                ),
            });
        }
        Ok(())
    }
}
