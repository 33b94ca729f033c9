//! Mapping of SDK failures onto [`StoreError`].
//!
//! Throttling is the only transient failure: HTTP 429, or one of the S3
//! throttling error codes (`SlowDown` is what S3 actually sends, with a 503).

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use driftcheck_core::store::StoreError;
use driftcheck_core::types::ObjectKey;

/// Error codes that signal rate limiting.
const THROTTLING_CODES: &[&str] = &[
    "SlowDown",
    "TooManyRequests",
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
];

/// Classify an SDK error returned by `operation`.
pub(crate) fn classify<E>(
    operation: &'static str,
    bucket: &str,
    key: Option<&ObjectKey>,
    err: &SdkError<E, HttpResponse>,
) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    classify_parts(
        operation,
        bucket,
        key,
        status,
        err.code(),
        DisplayErrorContext(err).to_string(),
    )
}

/// Classify a failure from its HTTP status and S3 error code.
///
/// `HeadObject` responses carry no body, so a bare 404 is resolved against
/// whether the call addressed a key.
pub(crate) fn classify_parts(
    operation: &'static str,
    bucket: &str,
    key: Option<&ObjectKey>,
    status: Option<u16>,
    code: Option<&str>,
    message: String,
) -> StoreError {
    if status == Some(429) || code.is_some_and(|c| THROTTLING_CODES.contains(&c)) {
        return StoreError::Throttled { operation, message };
    }
    let no_such_bucket = || StoreError::NoSuchBucket {
        bucket: bucket.to_owned(),
    };
    match (code, key) {
        (Some("NoSuchBucket"), _) => no_such_bucket(),
        (Some("NoSuchKey" | "NotFound"), Some(key)) => StoreError::NoSuchKey {
            bucket: bucket.to_owned(),
            key: key.to_string(),
        },
        (None, Some(key)) if status == Some(404) => StoreError::NoSuchKey {
            bucket: bucket.to_owned(),
            key: key.to_string(),
        },
        (None | Some("NotFound"), None) if status == Some(404) => no_such_bucket(),
        _ => StoreError::Service { operation, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ObjectKey {
        ObjectKey::new("a.json")
    }

    #[test]
    fn test_should_classify_http_429_as_throttled() {
        let err = classify_parts("ListObjectsV2", "b", None, Some(429), None, "rate".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_should_classify_slow_down_as_throttled() {
        let err = classify_parts(
            "HeadObject",
            "b",
            Some(&key()),
            Some(503),
            Some("SlowDown"),
            "Please reduce your request rate.".into(),
        );
        assert!(matches!(err, StoreError::Throttled { operation: "HeadObject", .. }));
    }

    #[test]
    fn test_should_classify_missing_bucket() {
        let err = classify_parts(
            "ListObjectsV2",
            "ghost",
            None,
            Some(404),
            Some("NoSuchBucket"),
            "gone".into(),
        );
        assert!(matches!(err, StoreError::NoSuchBucket { bucket } if bucket == "ghost"));
    }

    #[test]
    fn test_should_classify_bodiless_404_on_head_as_missing_key() {
        let err = classify_parts("HeadObject", "b", Some(&key()), Some(404), None, String::new());
        assert!(matches!(err, StoreError::NoSuchKey { key, .. } if key == "a.json"));
    }

    #[test]
    fn test_should_not_retry_access_denied() {
        let err = classify_parts(
            "GetObject",
            "b",
            Some(&key()),
            Some(403),
            Some("AccessDenied"),
            "Access Denied".into(),
        );
        assert!(!err.is_retryable());
        assert!(matches!(err, StoreError::Service { .. }));
    }
}
