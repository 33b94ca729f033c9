//! Apply-cycle boundary.
//!
//! The provisioning tool is an external collaborator: the harness only asks
//! it to apply a configuration and to report a named output. The summary it
//! prints on apply is an external contract:
//!
//! ```text
//! Apply complete! Resources: N added, M changed, K destroyed.
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use typed_builder::TypedBuilder;

use crate::error::{HarnessError, HarnessResult};
use crate::store::ObjectStoreClient;

/// Name of the output the tool reports its object state under.
pub const DEFAULT_OUTPUT_NAME: &str = "s3_objects";

static APPLY_SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Apply complete! Resources: (\d+) added, (\d+) changed, (\d+) destroyed\.")
        .expect("apply summary pattern is valid")
});

/// Options for one apply cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOptions {
    /// Directory holding the configuration to apply.
    #[builder(setter(into))]
    pub working_dir: PathBuf,

    /// Input variables (`-var name=value`).
    #[builder(default)]
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,

    /// Backend configuration (`-backend-config=name=value`).
    #[builder(default)]
    #[serde(default)]
    pub backend_config: BTreeMap<String, String>,

    /// State lock timeout (e.g. `5m`).
    #[builder(default = Some(String::from("5m")), setter(strip_option, into))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<String>,

    /// Upgrade modules and providers during init.
    #[builder(default = false)]
    #[serde(default)]
    pub upgrade: bool,

    /// Ignore any saved backend configuration during init.
    #[builder(default = false)]
    #[serde(default)]
    pub reconfigure: bool,

    /// Output holding the deployed objects.
    #[builder(default = String::from(DEFAULT_OUTPUT_NAME), setter(into))]
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_output_name() -> String {
    DEFAULT_OUTPUT_NAME.to_owned()
}

impl ApplyOptions {
    /// Add an input variable.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Add a backend configuration entry.
    #[must_use]
    pub fn with_backend(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.backend_config.insert(name.into(), value.into());
        self
    }
}

/// Resource counts reported by one apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    /// Resources added.
    pub added: u32,
    /// Resources changed in place.
    pub changed: u32,
    /// Resources destroyed.
    pub destroyed: u32,
    /// Full textual output of the apply.
    #[serde(skip)]
    pub raw_output: String,
}

impl ApplyResult {
    /// Parse the apply summary out of raw tool output.
    ///
    /// When the output holds several summary lines the last one wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use driftcheck_core::driver::ApplyResult;
    ///
    /// let out = "...\nApply complete! Resources: 1 added, 0 changed, 2 destroyed.\n";
    /// let result = ApplyResult::parse(out).unwrap();
    /// assert_eq!((result.added, result.changed, result.destroyed), (1, 0, 2));
    /// ```
    pub fn parse(raw_output: &str) -> HarnessResult<Self> {
        let caps = APPLY_SUMMARY
            .captures_iter(raw_output)
            .last()
            .ok_or(HarnessError::ApplySummary)?;
        let count = |i: usize| -> HarnessResult<u32> {
            caps[i]
                .parse()
                .map_err(|e| HarnessError::Internal(anyhow::anyhow!("bad resource count: {e}")))
        };
        Ok(Self {
            added: count(1)?,
            changed: count(2)?,
            destroyed: count(3)?,
            raw_output: raw_output.to_owned(),
        })
    }

    /// Whether the apply changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.changed == 0 && self.destroyed == 0
    }

    /// The `(added, changed, destroyed)` triple.
    #[must_use]
    pub fn counts(&self) -> (u32, u32, u32) {
        (self.added, self.changed, self.destroyed)
    }
}

/// External provisioning tool.
#[async_trait]
pub trait ProvisioningTool: Send + Sync {
    /// Initialize the working directory, then apply.
    async fn init_and_apply(&self, options: &ApplyOptions) -> HarnessResult<ApplyResult>;

    /// Apply without re-initializing.
    async fn apply(&self, options: &ApplyOptions) -> HarnessResult<ApplyResult>;

    /// Read a named output as JSON.
    async fn output(&self, options: &ApplyOptions, name: &str) -> HarnessResult<Value>;
}

/// Delete every object in `bucket`.
///
/// Used to reset state between scenarios. Any listing or deletion failure is
/// a precondition failure: a dirty bucket invalidates the scenario.
pub async fn empty_bucket<S>(store: &S, bucket: &str) -> HarnessResult<()>
where
    S: ObjectStoreClient + ?Sized,
{
    let keys = store.list(bucket).await.map_err(|e| {
        HarnessError::Precondition(format!("couldn't list objects in bucket {bucket}: {e}"))
    })?;
    if keys.is_empty() {
        return Ok(());
    }
    store.delete_many(bucket, &keys).await.map_err(|e| {
        warn!(bucket = %bucket, error = %e, "bulk delete failed");
        HarnessError::Precondition(format!("couldn't delete objects in bucket {bucket}: {e}"))
    })?;
    info!(bucket = %bucket, count = keys.len(), "bucket emptied");
    Ok(())
}
