//! Object store adapter integration tests.

#[cfg(test)]
mod tests {
    use driftcheck_core::driver::empty_bucket;
    use driftcheck_core::store::{ObjectStoreClient, StoreError};
    use driftcheck_core::types::{ObjectKey, ObservedMetadata};

    use crate::{
        cleanup_bucket, content_type, create_test_bucket, s3_client, s3_store, seed_object,
        test_bucket_name,
    };

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_list_keys_in_bucket() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "list").await;

        for key in ["b.json", "a.json", "delete me"] {
            seed_object(&store, &bucket, key, "{}", content_type("application/json")).await;
        }

        let mut keys = store.list(&bucket).await.expect("list");
        keys.sort();
        assert_eq!(
            keys,
            vec![
                ObjectKey::new("a.json"),
                ObjectKey::new("b.json"),
                ObjectKey::new("delete me"),
            ]
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_round_trip_recognized_headers() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "headers").await;

        let metadata = ObservedMetadata {
            content_type: Some("binary/octet-stream".to_owned()),
            cache_control: Some("public, max-age=31536000, immutable".to_owned()),
            content_disposition: Some("inline".to_owned()),
            content_encoding: Some("compress".to_owned()),
            content_language: Some("ja-JP".to_owned()),
        };
        seed_object(&store, &bucket, "b.json", "{}", metadata.clone()).await;

        let head = store
            .head(&bucket, &ObjectKey::new("b.json"))
            .await
            .expect("head");
        assert_eq!(head.metadata, metadata);
        assert!(head.body.is_none());
        assert!(head.etag.is_some());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_return_exact_body_bytes() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "body").await;

        let content = "{\n  \"a\": \"1\",\n  \"b\": 2,\n  \"c\": {\n    \"d\": \"3\"\n  }\n}\n";
        seed_object(&store, &bucket, "a.json", content, content_type("application/json")).await;

        let object = store
            .get(&bucket, &ObjectKey::new("a.json"))
            .await
            .expect("get");
        assert_eq!(object.body.as_deref(), Some(content.as_bytes()));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_copy_key_with_space() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "copy").await;

        seed_object(&store, &bucket, "a.json", "{}", content_type("application/json")).await;
        store
            .copy(&bucket, &ObjectKey::new("a.json"), &ObjectKey::new("delete me"))
            .await
            .expect("copy");
        let copied = store
            .head(&bucket, &ObjectKey::new("delete me"))
            .await
            .expect("head copy");
        assert_eq!(copied.metadata.content_type.as_deref(), Some("application/json"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_map_missing_key_and_bucket() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "missing").await;

        let err = store
            .head(&bucket, &ObjectKey::new("ghost.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NoSuchKey { .. }), "{err}");

        let err = store.list(&test_bucket_name("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::NoSuchBucket { .. }), "{err}");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires live S3 endpoint"]
    async fn test_should_empty_bucket() {
        let client = s3_client();
        let store = s3_store();
        let bucket = create_test_bucket(&client, "empty").await;

        for i in 0..5 {
            let key = format!("file-{i}.txt");
            store
                .put(
                    &bucket,
                    &ObjectKey::new(key),
                    driftcheck_core::store::PutObject::new("data"),
                )
                .await
                .expect("put");
        }

        empty_bucket(store.as_ref(), &bucket).await.expect("empty");
        assert!(store.list(&bucket).await.expect("list").is_empty());

        cleanup_bucket(&client, &bucket).await;
    }
}
