//! Error types for the verification harness.
//!
//! Only infrastructure failures are errors. Expected-vs-observed mismatches
//! are not errors: they are collected into a
//! [`VerificationVerdict`](crate::compare::VerificationVerdict) so a single
//! pass can report every discrepancy.

use std::path::PathBuf;

use crate::store::StoreError;

/// Harness error type.
///
/// Every variant represents a broken precondition: the object store, the
/// provisioning tool, or the local fixtures could not be used. A scenario
/// runner receiving one of these must stop the current scenario.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// A setup or teardown step failed (listing, bulk delete, task join).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An object store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A fixture file could not be read or parsed.
    #[error("failed to load fixture {path}: {message}")]
    Fixture {
        /// Path of the fixture file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// The provisioning tool output did not contain an apply summary line.
    #[error("apply summary line not found in provisioning tool output")]
    ApplySummary,

    /// The provisioning tool exited unsuccessfully or could not be started.
    #[error("provisioning tool failed: {command}: {message}")]
    Tool {
        /// The sub-command that failed (e.g. `apply`).
        command: String,
        /// Captured stderr or spawn error.
        message: String,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
