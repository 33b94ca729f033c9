//! Harness configuration.
//!
//! Provides [`HarnessConfig`]. Values are loaded from environment variables
//! by [`HarnessConfig::from_env`] at the edge of the program; everything
//! below receives the resolved config explicitly. Bucket and backend-state
//! names are derived from the `platform` and `tf_version` fields so parallel
//! CI jobs never share a bucket.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::compare::CompareOptions;
use crate::retry::RetryPolicy;

/// Harness configuration.
///
/// # Examples
///
/// ```
/// use driftcheck_core::config::HarnessConfig;
///
/// let config = HarnessConfig::builder()
///     .bucket_prefix("s3-deployment-test".into())
///     .platform("linux".into())
///     .tf_version("1.9.0".into())
///     .build();
/// assert_eq!(
///     config.bucket_name("simple"),
///     "s3-deployment-test-simple-linux-1.9.0"
/// );
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    /// AWS region of the bucket under test.
    #[builder(default = String::from("ap-northeast-1"))]
    pub region: String,

    /// Custom S3 endpoint (e.g. a local emulator). `None` uses AWS.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    /// Use path-style bucket addressing.
    #[builder(default = false)]
    pub force_path_style: bool,

    /// Provisioning tool binary (`terraform` or `tofu`).
    #[builder(default = String::from("terraform"))]
    pub terraform_binary: String,

    /// Root directory holding one configuration directory per scenario.
    #[builder(default = String::from("deploy"))]
    pub terraform_dir: String,

    /// Directory holding expected-state fixtures.
    #[builder(default = String::from("fixtures"))]
    pub fixture_dir: String,

    /// Platform tag used in bucket names (e.g. the CI runner OS).
    #[builder(default = String::from("unknown"))]
    pub platform: String,

    /// Tool version tag used in bucket names.
    #[builder(default = String::from("unknown"))]
    pub tf_version: String,

    /// Prefix for bucket names.
    #[builder(default = String::from("s3-deployment"))]
    pub bucket_prefix: String,

    /// State lock timeout passed to the tool.
    #[builder(default = String::from("5m"))]
    pub lock_timeout: String,

    /// Attempts for the eventual-consistency retrier.
    #[builder(default = 3)]
    pub retry_attempts: u32,

    /// Delay between retry attempts, in milliseconds.
    #[builder(default = 1000)]
    pub retry_delay_ms: u64,

    /// Compare `Content-Type` values.
    #[builder(default = true)]
    pub check_content_type: bool,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `AWS_REGION` / `DEFAULT_REGION` | `ap-northeast-1` |
    /// | `S3_ENDPOINT_URL` | *(unset)* |
    /// | `S3_FORCE_PATH_STYLE` | `false` |
    /// | `TF_BINARY` | `terraform` |
    /// | `TF_DIR` | `deploy` |
    /// | `FIXTURE_DIR` | `fixtures` |
    /// | `TF_PLATFORM` | `unknown` |
    /// | `TF_VERSION` | `unknown` |
    /// | `BUCKET_PREFIX` | `s3-deployment` |
    /// | `TF_LOCK_TIMEOUT` | `5m` |
    /// | `RETRY_ATTEMPTS` | `3` |
    /// | `RETRY_DELAY_MS` | `1000` |
    /// | `CHECK_CONTENT_TYPE` | `true` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("AWS_REGION").or_else(|_| std::env::var("DEFAULT_REGION")) {
            config.region = v;
        }
        if let Ok(v) = std::env::var("S3_ENDPOINT_URL") {
            config.endpoint_url = Some(v);
        }
        if let Ok(v) = std::env::var("S3_FORCE_PATH_STYLE") {
            config.force_path_style = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("TF_BINARY") {
            config.terraform_binary = v;
        }
        if let Ok(v) = std::env::var("TF_DIR") {
            config.terraform_dir = v;
        }
        if let Ok(v) = std::env::var("FIXTURE_DIR") {
            config.fixture_dir = v;
        }
        if let Ok(v) = std::env::var("TF_PLATFORM") {
            if !v.is_empty() {
                config.platform = v;
            }
        }
        if let Ok(v) = std::env::var("TF_VERSION") {
            if !v.is_empty() {
                config.tf_version = v;
            }
        }
        if let Ok(v) = std::env::var("BUCKET_PREFIX") {
            config.bucket_prefix = v;
        }
        if let Ok(v) = std::env::var("TF_LOCK_TIMEOUT") {
            config.lock_timeout = v;
        }
        if let Ok(v) = std::env::var("RETRY_ATTEMPTS") {
            if let Ok(n) = v.parse::<u32>() {
                config.retry_attempts = n;
            }
        }
        if let Ok(v) = std::env::var("RETRY_DELAY_MS") {
            if let Ok(n) = v.parse::<u64>() {
                config.retry_delay_ms = n;
            }
        }
        if let Ok(v) = std::env::var("CHECK_CONTENT_TYPE") {
            config.check_content_type = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Bucket name for a scenario: `<prefix>-<scenario>-<platform>-<version>`.
    ///
    /// The result is lowercased and every character outside `[a-z0-9.-]`
    /// becomes `-`.
    #[must_use]
    pub fn bucket_name(&self, scenario: &str) -> String {
        format!(
            "{}-{scenario}-{}-{}",
            self.bucket_prefix, self.platform, self.tf_version
        )
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '.' | '-') => c,
            _ => '-',
        })
        .collect()
    }

    /// Backend state key for a scenario.
    #[must_use]
    pub fn backend_key(&self, scenario: &str) -> String {
        format!("terraform-{}", self.bucket_name(scenario))
    }

    /// The retry policy described by this config.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
        )
    }

    /// Comparison options for metadata-only verification.
    #[must_use]
    pub fn compare_options(&self) -> CompareOptions {
        CompareOptions::builder()
            .check_content_type(self.check_content_type)
            .build()
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
