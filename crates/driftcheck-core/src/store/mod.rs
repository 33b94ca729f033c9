//! Object store client boundary.
//!
//! The harness only needs a handful of operations on a key/object/metadata
//! store. [`ObjectStoreClient`] captures them; [`MemoryObjectStore`] is an
//! in-process implementation and the `driftcheck-s3` crate provides one
//! backed by `aws-sdk-s3`.

mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{ObjectKey, ObservedMetadata, ObservedObject};

pub use memory::MemoryObjectStore;

/// Object store error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name.
        bucket: String,
    },

    /// The key does not exist.
    #[error("The specified key does not exist: {bucket}/{key}")]
    NoSuchKey {
        /// The bucket name.
        bucket: String,
        /// The missing key.
        key: String,
    },

    /// The remote API rejected the request because of rate limiting.
    #[error("{operation} throttled: {message}")]
    Throttled {
        /// The store operation (e.g. `ListObjectsV2`).
        operation: &'static str,
        /// Message from the remote service.
        message: String,
    },

    /// Any other service or transport failure.
    #[error("{operation} failed: {message}")]
    Service {
        /// The store operation (e.g. `HeadObject`).
        operation: &'static str,
        /// Message from the remote service or transport.
        message: String,
    },
}

impl StoreError {
    /// Whether this failure is the transient kind the retrier absorbs
    /// (HTTP 429 / rate limiting).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An object to upload.
#[derive(Debug, Clone, Default)]
pub struct PutObject {
    /// Object body.
    pub body: Bytes,
    /// Metadata headers to store with the object.
    pub metadata: ObservedMetadata,
}

impl PutObject {
    /// Create an upload with the given body and no metadata.
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            metadata: ObservedMetadata::default(),
        }
    }

    /// Attach metadata headers.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ObservedMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Remote key/object/metadata store.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// List every key in `bucket`.
    ///
    /// This is a single call; results beyond the first page are not fetched.
    async fn list(&self, bucket: &str) -> StoreResult<Vec<ObjectKey>>;

    /// Fetch metadata and ETag, without the body.
    async fn head(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject>;

    /// Fetch metadata, ETag, and body.
    async fn get(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject>;

    /// Create or replace an object.
    async fn put(&self, bucket: &str, key: &ObjectKey, object: PutObject) -> StoreResult<()>;

    /// Copy `source` to `destination` within `bucket`, keeping its metadata.
    async fn copy(
        &self,
        bucket: &str,
        source: &ObjectKey,
        destination: &ObjectKey,
    ) -> StoreResult<()>;

    /// Delete one object.
    async fn delete(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()>;

    /// Delete many objects in one request.
    async fn delete_many(&self, bucket: &str, keys: &[ObjectKey]) -> StoreResult<()>;
}
