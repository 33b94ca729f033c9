//! Verification pass integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use driftcheck_core::compare::{CompareOptions, Discrepancy};
    use driftcheck_core::retry::RetryPolicy;
    use driftcheck_core::types::{ExpectedObject, ExpectedState, ObjectKey, ObservedMetadata};
    use driftcheck_core::verify::Verifier;

    use crate::{cleanup_bucket, content_type, create_test_bucket, s3_client, s3_store, seed_object};

    fn policy() -> RetryPolicy {
        RetryPolicy::fixed(3, Duration::from_millis(200))
    }

    fn expected() -> ExpectedState {
        ExpectedState::from([
            (
                ObjectKey::new("a.json"),
                ExpectedObject::new()
                    .with_header("Content-Type", "application/json")
                    .with_header("Content-Language", "en-US"),
            ),
            (
                ObjectKey::new("index.html"),
                ExpectedObject::new()
                    .with_header("Content-Type", "text/html")
                    .with_header("Cache-Control", "public, max-age=0, must-revalidate"),
            ),
        ])
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_pass_seeded_bucket() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "verify").await;

        let a = ObservedMetadata {
            content_language: Some("en-US".to_owned()),
            ..content_type("application/json")
        };
        let index = ObservedMetadata {
            cache_control: Some("public, max-age=0, must-revalidate".to_owned()),
            ..content_type("text/html")
        };
        seed_object(&store, &bucket, "a.json", "{}", a).await;
        seed_object(&store, &bucket, "index.html", "<h1/>", index).await;

        let verdict = Verifier::new(Arc::clone(&store), CompareOptions::default(), policy())
            .verify(&bucket, &expected())
            .await
            .expect("verify");
        assert!(verdict.is_pass(), "{verdict}");
        assert_eq!(verdict.compared, 2);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_detect_missing_header() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "partial").await;

        // Content-Language is declared but never uploaded.
        seed_object(&store, &bucket, "a.json", "{}", content_type("application/json")).await;
        let index = ObservedMetadata {
            cache_control: Some("public, max-age=0, must-revalidate".to_owned()),
            ..content_type("text/html")
        };
        seed_object(&store, &bucket, "index.html", "<h1/>", index).await;

        let verdict = Verifier::new(Arc::clone(&store), CompareOptions::default(), policy())
            .verify(&bucket, &expected())
            .await
            .expect("verify");
        assert!(!verdict.is_pass());
        let a = ObjectKey::new("a.json");
        assert!(verdict.for_key(&a).any(|d| matches!(
            d,
            Discrepancy::FieldCount {
                expected: 2,
                matched: 1,
                ..
            }
        )));

        cleanup_bucket(&client, &bucket).await;
    }
}
