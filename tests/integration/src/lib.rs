//! Integration tests for driftcheck against a live S3 endpoint.
//!
//! These tests need a reachable S3-compatible endpoint (a local emulator at
//! `localhost:4566` by default, or `S3_ENDPOINT_URL`). They are marked
//! `#[ignore]` so they don't run during normal `cargo test`.
//!
//! Run them with:
//! ```text
//! cargo test -p driftcheck-integration -- --ignored
//! ```

use std::sync::{Arc, Once};

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use driftcheck_core::store::{ObjectStoreClient, PutObject};
use driftcheck_core::types::{ObjectKey, ObservedMetadata};
use driftcheck_s3::S3ObjectStore;

static INIT: Once = Once::new();

/// Route harness logs to the test writer, once per test binary.
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// S3 endpoint under test: `S3_ENDPOINT_URL`, or a local emulator.
fn endpoint_url() -> String {
    std::env::var("S3_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4566".to_owned())
}

/// S3 client for seeding and cleaning up buckets around a harness run.
///
/// Uses path-style addressing and static `test` credentials, which local
/// emulators accept.
#[must_use]
pub fn s3_client() -> aws_sdk_s3::Client {
    init_tracing();

    let creds = Credentials::new("test", "test", None, None, "driftcheck-integration");

    let config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(creds)
        .endpoint_url(endpoint_url())
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(config)
}

/// Create an [`S3ObjectStore`] over [`s3_client`].
#[must_use]
pub fn s3_store() -> Arc<S3ObjectStore> {
    Arc::new(S3ObjectStore::new(s3_client()))
}

/// Unique bucket name for one test, e.g. `driftcheck-drift-add-1a2b3c4d`.
#[must_use]
pub fn test_bucket_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("driftcheck-{prefix}-{}", &id[..8])
}

/// Create a bucket and return its name. Caller is responsible for cleanup.
pub async fn create_test_bucket(client: &aws_sdk_s3::Client, prefix: &str) -> String {
    let name = test_bucket_name(prefix);
    client
        .create_bucket()
        .bucket(&name)
        .send()
        .await
        .unwrap_or_else(|e| panic!("failed to create bucket {name}: {e}"));
    name
}

/// Delete all objects in a bucket, then delete the bucket.
pub async fn cleanup_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let store = S3ObjectStore::new(client.clone());
    if let Ok(keys) = store.list(bucket).await {
        if !keys.is_empty() {
            let _ = store.delete_many(bucket, &keys).await;
        }
    }
    let _ = client.delete_bucket().bucket(bucket).send().await;
}

/// Upload one object with a `Content-Type` and optional extra headers.
pub async fn seed_object(
    store: &S3ObjectStore,
    bucket: &str,
    key: &str,
    body: &'static str,
    metadata: ObservedMetadata,
) {
    store
        .put(
            bucket,
            &ObjectKey::new(key),
            PutObject::new(body).with_metadata(metadata),
        )
        .await
        .unwrap_or_else(|e| panic!("failed to seed {bucket}/{key}: {e}"));
}

/// Metadata with only a `Content-Type`.
#[must_use]
pub fn content_type(value: &str) -> ObservedMetadata {
    ObservedMetadata {
        content_type: Some(value.to_owned()),
        ..ObservedMetadata::default()
    }
}

mod test_drift;
mod test_store;
mod test_verify;
