//! In-memory object store.
//!
//! [`MemoryObjectStore`] keeps buckets in a `DashMap` and each bucket's
//! objects behind a `parking_lot::RwLock`, so it can be shared across the
//! fetcher's concurrent tasks without external locking.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{ObjectStoreClient, PutObject, StoreError, StoreResult};
use crate::types::{ObjectKey, ObservedMetadata, ObservedObject};

/// A stored object.
#[derive(Debug, Clone)]
struct StoredObject {
    etag: String,
    metadata: ObservedMetadata,
    body: Bytes,
}

impl StoredObject {
    fn new(object: PutObject) -> Self {
        Self {
            etag: compute_etag(&object.body),
            metadata: object.metadata,
            body: object.body,
        }
    }

    fn observe(&self, with_body: bool) -> ObservedObject {
        ObservedObject {
            metadata: self.metadata.clone(),
            body: with_body.then(|| self.body.clone()),
            etag: Some(self.etag.clone()),
        }
    }
}

/// Per-bucket object table.
#[derive(Debug, Default)]
struct MemoryBucket {
    objects: RwLock<BTreeMap<ObjectKey, StoredObject>>,
}

/// Thread-safe in-memory [`ObjectStoreClient`].
///
/// # Examples
///
/// ```
/// use driftcheck_core::store::MemoryObjectStore;
///
/// let store = MemoryObjectStore::new();
/// store.create_bucket("site");
/// assert!(store.bucket_exists("site"));
/// ```
#[derive(Default)]
pub struct MemoryObjectStore {
    buckets: DashMap<String, MemoryBucket>,
}

impl std::fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("bucket_count", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bucket if it does not already exist.
    pub fn create_bucket(&self, name: &str) {
        self.buckets.entry(name.to_owned()).or_default();
        info!(bucket = %name, "bucket created");
    }

    /// Check whether a bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    fn with_bucket<T>(
        &self,
        bucket: &str,
        f: impl FnOnce(&MemoryBucket) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let entry = self
            .buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: bucket.to_owned(),
            })?;
        f(entry.value())
    }

    fn read_object(
        &self,
        bucket: &str,
        key: &ObjectKey,
        with_body: bool,
    ) -> StoreResult<ObservedObject> {
        self.with_bucket(bucket, |b| {
            b.objects
                .read()
                .get(key)
                .map(|o| o.observe(with_body))
                .ok_or_else(|| StoreError::NoSuchKey {
                    bucket: bucket.to_owned(),
                    key: key.to_string(),
                })
        })
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn list(&self, bucket: &str) -> StoreResult<Vec<ObjectKey>> {
        self.with_bucket(bucket, |b| Ok(b.objects.read().keys().cloned().collect()))
    }

    async fn head(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
        self.read_object(bucket, key, false)
    }

    async fn get(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
        self.read_object(bucket, key, true)
    }

    async fn put(&self, bucket: &str, key: &ObjectKey, object: PutObject) -> StoreResult<()> {
        self.with_bucket(bucket, |b| {
            b.objects.write().insert(key.clone(), StoredObject::new(object));
            Ok(())
        })?;
        debug!(bucket = %bucket, key = %key, "object stored");
        Ok(())
    }

    async fn copy(
        &self,
        bucket: &str,
        source: &ObjectKey,
        destination: &ObjectKey,
    ) -> StoreResult<()> {
        self.with_bucket(bucket, |b| {
            let mut objects = b.objects.write();
            let copied = objects
                .get(source)
                .cloned()
                .ok_or_else(|| StoreError::NoSuchKey {
                    bucket: bucket.to_owned(),
                    key: source.to_string(),
                })?;
            objects.insert(destination.clone(), copied);
            Ok(())
        })
    }

    async fn delete(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        // Deleting a missing key succeeds, as it does on S3.
        self.with_bucket(bucket, |b| {
            b.objects.write().remove(key);
            Ok(())
        })
    }

    async fn delete_many(&self, bucket: &str, keys: &[ObjectKey]) -> StoreResult<()> {
        self.with_bucket(bucket, |b| {
            let mut objects = b.objects.write();
            for key in keys {
                objects.remove(key);
            }
            Ok(())
        })?;
        debug!(bucket = %bucket, count = keys.len(), "objects deleted");
        Ok(())
    }
}

/// Quoted hex MD5 of `data`, the ETag format S3 uses for single-part uploads.
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}
