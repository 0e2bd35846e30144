//! Bucket and key listing integration tests.

#[cfg(test)]
mod tests {
    use objstore_core::{AccountId, AwsRegion};
    use objstore_s3::S3ServiceError;

    use crate::{create_test_bucket, put_bytes, test_bucket_name, test_state};

    #[test]
    fn test_should_list_with_prefix_and_delimiter() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "list");
        for key in [
            "photos/2024/a.jpg",
            "photos/2024/b.jpg",
            "photos/2025/c.jpg",
            "photos/readme.txt",
            "videos/v.mp4",
        ] {
            put_bytes(&bucket, key, key.as_bytes()).expect("put");
        }

        let result = bucket.list_objects("photos/", "/", "", 1000);
        let keys: Vec<_> = result.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["photos/readme.txt"]);
        assert_eq!(result.common_prefixes, vec!["photos/2024/", "photos/2025/"]);
        assert!(!result.is_truncated);
    }

    #[test]
    fn test_should_paginate_keys() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "page");
        for i in 0..5 {
            put_bytes(&bucket, &format!("key-{i}"), b"x").expect("put");
        }

        let mut seen = Vec::new();
        let mut marker = String::new();
        loop {
            let page = bucket.list_objects("", "", &marker, 2);
            seen.extend(page.objects.iter().map(|o| o.key.clone()));
            match page.next_marker {
                Some(next) if page.is_truncated => marker = next,
                _ => break,
            }
        }
        assert_eq!(seen, vec!["key-0", "key-1", "key-2", "key-3", "key-4"]);
    }

    #[test]
    fn test_should_list_buckets_per_partition() {
        let state = test_state();
        let account = AccountId::default();
        let region = AwsRegion::default();
        let first = create_test_bucket(&state, "lb");
        let second = create_test_bucket(&state, "lb");

        let names: Vec<_> = state
            .list_buckets(&account, &region)
            .iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&first.name));
        assert!(names.contains(&second.name));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));

        assert!(
            state
                .list_buckets(&account, &AwsRegion::new("ap-south-1"))
                .is_empty()
        );
    }

    #[test]
    fn test_should_report_missing_bucket() {
        let state = test_state();
        let err = state
            .get_bucket(
                &test_bucket_name("missing"),
                &AccountId::default(),
                &AwsRegion::default(),
            )
            .expect_err("missing");
        assert!(matches!(err, S3ServiceError::NoSuchBucket { .. }));
        assert_eq!(err.code(), "NoSuchBucket");
        assert!(!err.is_retryable());
    }
}
