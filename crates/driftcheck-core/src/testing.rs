//! Test support: a provisioning tool that applies through the object store.
//!
//! Only compiled for this crate's tests or with the `test-util` feature.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::driver::{ApplyOptions, ApplyResult, ProvisioningTool};
use crate::error::HarnessResult;
use crate::store::{ObjectStoreClient, PutObject, StoreError};
use crate::types::ObjectKey;

/// Converges a bucket onto a fixed set of declared objects.
///
/// Every apply deletes undeclared keys, uploads missing ones and rewrites
/// declared keys whose metadata or body differs, then reports the counts in
/// the same summary format Terraform prints. The bucket must already exist.
pub struct ConvergingTool<S: ?Sized> {
    store: Arc<S>,
    bucket: String,
    declared: BTreeMap<ObjectKey, PutObject>,
}

impl<S: ?Sized> std::fmt::Debug for ConvergingTool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConvergingTool")
            .field("bucket", &self.bucket)
            .field("declared", &self.declared.len())
            .finish_non_exhaustive()
    }
}

impl<S: ObjectStoreClient + ?Sized> ConvergingTool<S> {
    /// Create a tool that manages `declared` in `bucket`.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        bucket: impl Into<String>,
        declared: BTreeMap<ObjectKey, PutObject>,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            declared,
        }
    }

    /// Run one apply.
    pub async fn converge(&self) -> HarnessResult<ApplyResult> {
        let (mut added, mut changed, mut destroyed) = (0, 0, 0);
        for key in self.store.list(&self.bucket).await? {
            if !self.declared.contains_key(&key) {
                self.store.delete(&self.bucket, &key).await?;
                destroyed += 1;
            }
        }
        for (key, object) in &self.declared {
            match self.store.get(&self.bucket, key).await {
                Ok(current)
                    if current.metadata == object.metadata
                        && current.body.as_ref() == Some(&object.body) => {}
                Ok(_) => {
                    self.store.put(&self.bucket, key, object.clone()).await?;
                    changed += 1;
                }
                Err(StoreError::NoSuchKey { .. }) => {
                    self.store.put(&self.bucket, key, object.clone()).await?;
                    added += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
        ApplyResult::parse(&format!(
            "Apply complete! Resources: {added} added, {changed} changed, {destroyed} destroyed.\n"
        ))
    }
}

#[async_trait]
impl<S: ObjectStoreClient + ?Sized> ProvisioningTool for ConvergingTool<S> {
    async fn init_and_apply(&self, _options: &ApplyOptions) -> HarnessResult<ApplyResult> {
        self.converge().await
    }

    async fn apply(&self, _options: &ApplyOptions) -> HarnessResult<ApplyResult> {
        self.converge().await
    }

    /// `key -> {"content_type": ..}` for every declared object.
    async fn output(&self, _options: &ApplyOptions, _name: &str) -> HarnessResult<Value> {
        let objects: Map<String, Value> = self
            .declared
            .iter()
            .map(|(key, object)| {
                (
                    key.to_string(),
                    json!({ "content_type": object.metadata.content_type }),
                )
            })
            .collect();
        Ok(Value::Object(objects))
    }
}
