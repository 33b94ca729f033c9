//! Drift scenarios against a live endpoint.
//!
//! The provisioning tool is replaced by `ConvergingTool`, which converges
//! the bucket onto a declared object set through the same store the harness
//! verifies with. This exercises the real listing, copy, delete and
//! consistency behavior without needing Terraform.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use driftcheck_core::driver::{ApplyOptions, ApplyResult};
    use driftcheck_core::retry::RetryPolicy;
    use driftcheck_core::scenario::{Drift, Scenario, ScenarioRunner, Step};
    use driftcheck_core::store::PutObject;
    use driftcheck_core::testing::ConvergingTool;
    use driftcheck_core::types::{ExpectedObject, ExpectedState, ObjectKey};
    use driftcheck_s3::S3ObjectStore;

    use crate::{cleanup_bucket, content_type, create_test_bucket, s3_client, s3_store};

    const A_JSON: &str = "{\n  \"a\": \"1\",\n  \"b\": 2,\n  \"c\": {\n    \"d\": \"3\"\n  }\n}\n";

    type Runner = ScenarioRunner<S3ObjectStore, ConvergingTool<S3ObjectStore>>;

    async fn setup(prefix: &str) -> (Runner, String) {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, prefix).await;
        let declared = BTreeMap::from([
            (
                ObjectKey::new("a.json"),
                PutObject::new(A_JSON).with_metadata(content_type("application/json")),
            ),
            (
                ObjectKey::new("style.css"),
                PutObject::new("body {}\n").with_metadata(content_type("text/css")),
            ),
        ]);
        let tool = Arc::new(ConvergingTool::new(Arc::clone(&store), bucket.clone(), declared));
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        (ScenarioRunner::new(store, tool, policy), bucket)
    }

    fn scenario(bucket: &str, steps: Vec<Step>) -> Scenario {
        let expected = ExpectedState::from([
            (
                ObjectKey::new("a.json"),
                ExpectedObject::new()
                    .with_header("Content-Type", "application/json")
                    .with_content(A_JSON),
            ),
            (
                ObjectKey::new("style.css"),
                ExpectedObject::new().with_header("Content-Type", "text/css"),
            ),
        ]);
        let mut scenario = Scenario::builder()
            .name("live")
            .options(ApplyOptions::builder().working_dir(".").build())
            .bucket(bucket)
            .expected(expected)
            .steps(steps)
            .build();
        scenario.compare.check_content = true;
        scenario
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_correct_added_object() {
        let (runner, bucket) = setup("drift-add").await;
        let report = runner
            .run(&scenario(
                &bucket,
                vec![
                    Step::ApplyAndVerify,
                    Step::Drift(Drift::Add {
                        source: ObjectKey::new("a.json"),
                        key: ObjectKey::new("delete me"),
                    }),
                    Step::ReapplyAndVerify,
                ],
            ))
            .await
            .expect("scenario");
        assert!(report.is_pass(), "{report}");
        let reapply = report.steps[2].apply.as_ref().expect("apply summary");
        assert_eq!(reapply.counts(), (0, 0, 1));

        cleanup_bucket(&s3_client(), &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_restore_deleted_object() {
        let (runner, bucket) = setup("drift-delete").await;
        let report = runner
            .run(&scenario(
                &bucket,
                vec![
                    Step::ApplyAndVerify,
                    Step::Drift(Drift::Delete {
                        key: ObjectKey::new("a.json"),
                    }),
                    Step::ReapplyAndVerify,
                    Step::ReapplyIdempotent,
                ],
            ))
            .await
            .expect("scenario");
        assert!(report.is_pass(), "{report}");
        assert_eq!(report.steps[2].apply.as_ref().map(ApplyResult::counts), Some((1, 0, 0)));

        cleanup_bucket(&s3_client(), &bucket).await;
    }
}
