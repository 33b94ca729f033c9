//! S3 object store adapter for driftcheck.
//!
//! Implements [`driftcheck_core::store::ObjectStoreClient`] with
//! `aws-sdk-s3`. Listing is a single `ListObjectsV2` call. Rate-limit
//! responses surface as [`StoreError::Throttled`] so the harness retrier can
//! absorb them; everything else is a hard failure.
//!
//! [`StoreError::Throttled`]: driftcheck_core::store::StoreError::Throttled

mod client;
mod error;

pub use client::{S3ObjectStore, build_client};
