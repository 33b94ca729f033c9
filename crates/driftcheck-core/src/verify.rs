//! One verification pass: list, retry, fetch, compare.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::compare::{Comparator, CompareOptions, VerificationVerdict};
use crate::error::{HarnessError, HarnessResult};
use crate::fetch::SnapshotFetcher;
use crate::retry::{Retrier, RetryPolicy};
use crate::store::ObjectStoreClient;
use crate::types::{ExpectedState, ObjectKey};

/// Verifies a bucket against expected state.
///
/// Only the key-set check is retried: it is the step most exposed to
/// listing lag right after an apply. Throttled store calls are retried too;
/// any other store failure ends the pass with an error.
pub struct Verifier<S: ?Sized> {
    fetcher: SnapshotFetcher<S>,
    comparator: Comparator,
    policy: RetryPolicy,
}

impl<S: ?Sized> std::fmt::Debug for Verifier<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("fetcher", &self.fetcher)
            .field("comparator", &self.comparator)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> Verifier<S>
where
    S: ObjectStoreClient + ?Sized + 'static,
{
    /// Create a verifier.
    #[must_use]
    pub fn new(store: Arc<S>, options: CompareOptions, policy: RetryPolicy) -> Self {
        Self {
            fetcher: SnapshotFetcher::new(store).mode(options.fetch_mode()),
            comparator: Comparator::new(options),
            policy,
        }
    }

    /// The comparison options in use.
    #[must_use]
    pub fn options(&self) -> &CompareOptions {
        self.comparator.options()
    }

    /// Run one verification pass.
    ///
    /// Store failures are returned as errors; mismatches are reported in the
    /// verdict.
    pub async fn verify(
        &self,
        bucket: &str,
        expected: &ExpectedState,
    ) -> HarnessResult<VerificationVerdict> {
        let expected_keys: Vec<ObjectKey> = expected.keys().cloned().collect();
        let listed: Mutex<Vec<ObjectKey>> = Mutex::new(Vec::new());

        let fetcher = &self.fetcher;
        let listed_ref = &listed;
        let expected_ref = &expected_keys;
        let outcome = Retrier::new(self.policy)
            .retry_if(|e: &HarnessError| {
                matches!(e, HarnessError::Store(s) if s.is_retryable())
            })
            .retry_until(move || async move {
                let keys = fetcher.list_keys(bucket).await?;
                let equal = keys == *expected_ref;
                *listed_ref.lock() = keys;
                Ok(equal)
            })
            .await;

        if let Some(e) = outcome.last_error {
            return Err(e);
        }
        if !outcome.satisfied {
            warn!(bucket = %bucket, attempts = outcome.attempts, "object keys still differ");
        }

        let observed_keys = listed.into_inner();
        let snapshot = self.fetcher.fetch_keys(bucket, &observed_keys).await?;
        let verdict = self.comparator.compare(expected, &snapshot);
        info!(
            bucket = %bucket,
            passed = verdict.is_pass(),
            objects = snapshot.len(),
            discrepancies = verdict.discrepancies.len(),
            "verification finished"
        );
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryObjectStore, PutObject, StoreError, StoreResult};
    use crate::types::{ExpectedObject, ObservedMetadata, ObservedObject};

    fn instant() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::ZERO)
    }

    async fn put(store: &MemoryObjectStore, key: &str, content_type: &str) {
        let metadata = ObservedMetadata {
            content_type: Some(content_type.to_owned()),
            ..ObservedMetadata::default()
        };
        store
            .put("site", &ObjectKey::new(key), PutObject::new("x").with_metadata(metadata))
            .await
            .unwrap();
    }

    fn expected() -> ExpectedState {
        [("index.html", "text/html"), ("style.css", "text/css")]
            .into_iter()
            .map(|(k, ct)| {
                (
                    ObjectKey::new(k),
                    ExpectedObject::new().with_header("Content-Type", ct),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_should_pass_matching_bucket() {
        let store = Arc::new(MemoryObjectStore::new());
        store.create_bucket("site");
        put(&store, "index.html", "text/html").await;
        put(&store, "style.css", "text/css").await;

        let verdict = Verifier::new(store, CompareOptions::default(), instant())
            .verify("site", &expected())
            .await
            .unwrap();
        assert!(verdict.is_pass(), "{verdict}");
    }

    #[tokio::test]
    async fn test_should_report_extra_key_after_retries() {
        let store = Arc::new(MemoryObjectStore::new());
        store.create_bucket("site");
        put(&store, "index.html", "text/html").await;
        put(&store, "style.css", "text/css").await;
        put(&store, "delete me", "text/html").await;

        let verdict = Verifier::new(store, CompareOptions::default(), instant())
            .verify("site", &expected())
            .await
            .unwrap();
        let mismatch = verdict.key_set.expect("key set mismatch");
        assert_eq!(mismatch.unexpected(), vec![&ObjectKey::new("delete me")]);
    }

    #[tokio::test]
    async fn test_should_surface_missing_bucket_as_error() {
        let store = Arc::new(MemoryObjectStore::new());
        let err = Verifier::new(store, CompareOptions::default(), instant())
            .verify("ghost", &expected())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Store(StoreError::NoSuchBucket { .. })
        ));
    }

    /// Wraps a memory store and throttles the first `throttled` listings.
    #[derive(Debug)]
    struct ThrottlingStore {
        inner: MemoryObjectStore,
        throttled: u32,
        lists: AtomicU32,
    }

    #[async_trait]
    impl ObjectStoreClient for ThrottlingStore {
        async fn list(&self, bucket: &str) -> StoreResult<Vec<ObjectKey>> {
            if self.lists.fetch_add(1, Ordering::SeqCst) < self.throttled {
                return Err(StoreError::Throttled {
                    operation: "ListObjectsV2",
                    message: "Rate exceeded".to_owned(),
                });
            }
            self.inner.list(bucket).await
        }
        async fn head(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
            self.inner.head(bucket, key).await
        }
        async fn get(&self, bucket: &str, key: &ObjectKey) -> StoreResult<ObservedObject> {
            self.inner.get(bucket, key).await
        }
        async fn put(&self, bucket: &str, key: &ObjectKey, object: PutObject) -> StoreResult<()> {
            self.inner.put(bucket, key, object).await
        }
        async fn copy(&self, bucket: &str, src: &ObjectKey, dst: &ObjectKey) -> StoreResult<()> {
            self.inner.copy(bucket, src, dst).await
        }
        async fn delete(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
            self.inner.delete(bucket, key).await
        }
        async fn delete_many(&self, bucket: &str, keys: &[ObjectKey]) -> StoreResult<()> {
            self.inner.delete_many(bucket, keys).await
        }
    }

    async fn throttling_store(throttled: u32) -> Arc<ThrottlingStore> {
        let inner = MemoryObjectStore::new();
        inner.create_bucket("site");
        put(&inner, "index.html", "text/html").await;
        put(&inner, "style.css", "text/css").await;
        Arc::new(ThrottlingStore {
            inner,
            throttled,
            lists: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_should_absorb_throttled_listing() {
        let store = throttling_store(2).await;
        let verdict = Verifier::new(Arc::clone(&store), CompareOptions::default(), instant())
            .verify("site", &expected())
            .await
            .unwrap();
        assert!(verdict.is_pass(), "{verdict}");
        assert_eq!(store.lists.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_should_fail_when_throttling_outlasts_retries() {
        let store = throttling_store(5).await;
        let err = Verifier::new(store, CompareOptions::default(), instant())
            .verify("site", &expected())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Store(StoreError::Throttled { .. })
        ));
    }
}
