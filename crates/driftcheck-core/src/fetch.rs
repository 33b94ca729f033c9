//! Concurrent snapshot fetching.
//!
//! The fetcher lists a bucket once, then reads every key on its own tokio
//! task. Each task hands its result to a [`SnapshotSink`]; the default sink
//! is a single mutex-guarded map whose lock is held only for the insert, so
//! network I/O is never serialized. Every task is joined before the snapshot
//! is frozen: there is no partial-result path.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use crate::store::ObjectStoreClient;
use crate::types::{ObjectKey, ObservedObject, Snapshot};

/// How much of each object to read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchMode {
    /// Metadata only (`HeadObject`).
    #[default]
    Head,
    /// Metadata and body (`GetObject`).
    Get,
}

/// Thread-safe accumulator that concurrent fetch tasks write into.
///
/// Alternative concurrency models (actors, channels) can implement this and
/// be passed to [`SnapshotFetcher::fetch_keys_into`].
pub trait SnapshotSink: Send + Sync {
    /// Record the observed state of one key.
    fn insert(&self, key: ObjectKey, object: ObservedObject);

    /// Freeze everything recorded so far into a snapshot.
    fn freeze(&self) -> Snapshot;
}

/// The default [`SnapshotSink`]: one map behind one mutex.
#[derive(Debug, Default)]
pub struct LockedSnapshot {
    objects: Mutex<BTreeMap<ObjectKey, ObservedObject>>,
}

impl LockedSnapshot {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotSink for LockedSnapshot {
    fn insert(&self, key: ObjectKey, object: ObservedObject) {
        self.objects.lock().insert(key, object);
    }

    fn freeze(&self) -> Snapshot {
        Snapshot::new(std::mem::take(&mut *self.objects.lock()))
    }
}

/// Builds [`Snapshot`]s from an object store.
pub struct SnapshotFetcher<S: ?Sized> {
    store: Arc<S>,
    mode: FetchMode,
}

impl<S: ?Sized> std::fmt::Debug for SnapshotFetcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotFetcher")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<S: ?Sized> Clone for SnapshotFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            mode: self.mode,
        }
    }
}

impl<S> SnapshotFetcher<S>
where
    S: ObjectStoreClient + ?Sized + 'static,
{
    /// Create a metadata-only fetcher.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            mode: FetchMode::Head,
        }
    }

    /// Set the fetch mode.
    #[must_use]
    pub fn mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// The configured fetch mode.
    #[must_use]
    pub fn fetch_mode(&self) -> FetchMode {
        self.mode
    }

    /// List every key in `bucket`, sorted lexicographically.
    pub async fn list_keys(&self, bucket: &str) -> HarnessResult<Vec<ObjectKey>> {
        let mut keys = self.store.list(bucket).await?;
        keys.sort();
        Ok(keys)
    }

    /// List `bucket` and fetch every object in it.
    pub async fn fetch_snapshot(&self, bucket: &str) -> HarnessResult<Snapshot> {
        let keys = self.list_keys(bucket).await?;
        self.fetch_keys(bucket, &keys).await
    }

    /// Fetch `keys` concurrently into a fresh [`LockedSnapshot`].
    pub async fn fetch_keys(&self, bucket: &str, keys: &[ObjectKey]) -> HarnessResult<Snapshot> {
        let sink = Arc::new(LockedSnapshot::new());
        self.fetch_keys_into(bucket, keys, Arc::clone(&sink) as Arc<dyn SnapshotSink>)
            .await?;
        Ok(sink.freeze())
    }

    /// Fetch `keys` concurrently, one task per key, writing into `sink`.
    ///
    /// Returns only after every task has finished. The first failed read
    /// (or panicked task) makes the whole fetch fail.
    pub async fn fetch_keys_into(
        &self,
        bucket: &str,
        keys: &[ObjectKey],
        sink: Arc<dyn SnapshotSink>,
    ) -> HarnessResult<()> {
        let mut tasks = JoinSet::new();
        for key in keys {
            let store = Arc::clone(&self.store);
            let sink = Arc::clone(&sink);
            let bucket = bucket.to_owned();
            let key = key.clone();
            let mode = self.mode;
            tasks.spawn(async move {
                let object = match mode {
                    FetchMode::Head => store.head(&bucket, &key).await,
                    FetchMode::Get => store.get(&bucket, &key).await,
                }?;
                debug!(bucket = %bucket, key = %key, etag = ?object.etag, "object fetched");
                sink.insert(key, object);
                Ok::<(), HarnessError>(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| {
                HarnessError::Precondition(format!("object fetch task failed: {e}"))
            });
            if let Err(e) = result.and_then(|r| r) {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        info!(bucket = %bucket, count = keys.len(), mode = ?self.mode, "snapshot fetched");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::store::{MemoryObjectStore, PutObject, StoreError, StoreResult};
    use crate::types::ObservedMetadata;

    async fn seeded_store() -> Arc<MemoryObjectStore> {
        let store = Arc::new(MemoryObjectStore::new());
        store.create_bucket("site");
        for (key, ct) in [
            ("index.html", "text/html"),
            ("style.css", "text/css"),
            ("a.json", "application/json"),
        ] {
            let metadata = ObservedMetadata {
                content_type: Some(ct.to_owned()),
                ..ObservedMetadata::default()
            };
            store
                .put(
                    "site",
                    &ObjectKey::new(key),
                    PutObject::new(format!("body of {key}")).with_metadata(metadata),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_should_fetch_all_objects_with_head() {
        let store = seeded_store().await;
        let snapshot = SnapshotFetcher::new(store)
            .fetch_snapshot("site")
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        let obj = snapshot.get(&ObjectKey::new("style.css")).unwrap();
        assert_eq!(obj.metadata.content_type.as_deref(), Some("text/css"));
        assert!(obj.body.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_fetch_bodies_in_get_mode() {
        let store = seeded_store().await;
        let snapshot = SnapshotFetcher::new(store)
            .mode(FetchMode::Get)
            .fetch_snapshot("site")
            .await
            .unwrap();

        let obj = snapshot.get(&ObjectKey::new("a.json")).unwrap();
        assert_eq!(obj.body.as_deref(), Some(&b"body of a.json"[..]));
    }

    #[tokio::test]
    async fn test_should_fail_whole_fetch_when_one_read_fails() {
        let store = seeded_store().await;
        let keys = vec![ObjectKey::new("a.json"), ObjectKey::new("missing.txt")];
        let err = SnapshotFetcher::new(store)
            .fetch_keys("site", &keys)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HarnessError::Store(StoreError::NoSuchKey { .. })
        ));
    }

    #[derive(Debug, Default)]
    struct CountingSink {
        inner: LockedSnapshot,
        inserts: AtomicUsize,
    }

    impl SnapshotSink for CountingSink {
        fn insert(&self, key: ObjectKey, object: ObservedObject) {
            self.inserts.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(key, object);
        }

        fn freeze(&self) -> Snapshot {
            self.inner.freeze()
        }
    }

    #[tokio::test]
    async fn test_should_write_through_injected_sink() {
        let store = seeded_store().await;
        let fetcher = SnapshotFetcher::new(store);
        let keys = fetcher.list_keys("site").await.unwrap();
        let sink = Arc::new(CountingSink::default());

        fetcher
            .fetch_keys_into("site", &keys, Arc::clone(&sink) as Arc<dyn SnapshotSink>)
            .await
            .unwrap();

        assert_eq!(sink.inserts.load(Ordering::SeqCst), 3);
        assert_eq!(sink.freeze().len(), 3);
    }

    /// Store whose `head` panics, to exercise task-join failure handling.
    #[derive(Debug)]
    struct PanickingStore;

    #[async_trait]
    impl ObjectStoreClient for PanickingStore {
        async fn list(&self, _bucket: &str) -> StoreResult<Vec<ObjectKey>> {
            Ok(vec![ObjectKey::new("boom")])
        }
        async fn head(&self, _bucket: &str, _key: &ObjectKey) -> StoreResult<ObservedObject> {
            panic!("head exploded")
        }
        async fn get(&self, _bucket: &str, _key: &ObjectKey) -> StoreResult<ObservedObject> {
            panic!("get exploded")
        }
        async fn put(&self, _: &str, _: &ObjectKey, _: PutObject) -> StoreResult<()> {
            Ok(())
        }
        async fn copy(&self, _: &str, _: &ObjectKey, _: &ObjectKey) -> StoreResult<()> {
            Ok(())
        }
        async fn delete(&self, _: &str, _: &ObjectKey) -> StoreResult<()> {
            Ok(())
        }
        async fn delete_many(&self, _: &str, _: &[ObjectKey]) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_should_report_panicked_task_as_precondition() {
        let err = SnapshotFetcher::new(Arc::new(PanickingStore))
            .fetch_snapshot("any")
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Precondition(_)));
    }
}
