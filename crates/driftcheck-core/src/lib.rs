//! Deployment-state verification harness.
//!
//! Drives a provisioning tool (Terraform / OpenTofu) through apply cycles
//! and checks that the bucket it manages matches an expected state: the key
//! set, the recognized metadata headers of every object, and optionally the
//! object bodies. Listing lag right after an apply is absorbed by a bounded
//! retrier. Out-of-band drift can be injected between applies to check that
//! a re-apply converges back.
//!
//! # Architecture
//!
//! ```text
//! ScenarioRunner (steps, report)
//!        |                  \
//!        v                   v
//!    Verifier          ProvisioningTool (apply, output)
//!        |
//!        +--> Retrier (key-set check, throttling)
//!        +--> SnapshotFetcher (one task per key) --> ObjectStoreClient
//!        +--> Comparator (keys, fields, content)
//! ```

pub mod compare;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod fixture;
pub mod retry;
pub mod scenario;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod types;
pub mod verify;

pub use compare::{CompareOptions, VerificationVerdict};
pub use config::HarnessConfig;
pub use driver::{ApplyOptions, ApplyResult, ProvisioningTool};
pub use error::{HarnessError, HarnessResult};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner};
pub use store::{ObjectStoreClient, StoreError};
pub use verify::Verifier;
