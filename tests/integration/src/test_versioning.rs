//! Versioning integration tests.

#[cfg(test)]
mod tests {
    use objstore_s3::S3ServiceError;
    use objstore_s3::state::{NULL_VERSION_ID, VersioningStatus};

    use crate::{create_test_bucket, put_bytes, read_body, test_state};

    #[test]
    fn test_should_create_versions_on_overwrite() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "verput");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");

        let v1 = put_bytes(&bucket, "versioned.txt", b"v1").expect("put v1");
        let v2 = put_bytes(&bucket, "versioned.txt", b"v2-longer").expect("put v2");
        let v1_id = v1.version_id.clone().expect("v1 id");
        let v2_id = v2.version_id.clone().expect("v2 id");
        assert_ne!(v1_id, v2_id);

        let old = bucket
            .get_object("versioned.txt", Some(&v1_id))
            .expect("get v1");
        assert_eq!(read_body(&old).expect("read"), b"v1");
        let latest = bucket.get_object("versioned.txt", None).expect("get latest");
        assert_eq!(latest.version_id.as_deref(), Some(v2_id.as_str()));

        let chain = bucket
            .objects()
            .get_all_versions("versioned.txt")
            .expect("chain");
        assert_eq!(chain.len(), 2);
        assert_eq!(
            chain
                .iter()
                .filter(|v| v.as_object().is_some_and(|o| o.is_current()))
                .count(),
            1
        );
    }

    #[test]
    fn test_should_hide_deleted_key_and_restore_it() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "verdel");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");
        put_bytes(&bucket, "a.txt", b"data").expect("put");

        let outcome = bucket.delete_object("a.txt", None);
        assert!(outcome.delete_marker);
        let marker = outcome.version_id.expect("marker id");

        let err = bucket.get_object("a.txt", None).expect_err("deleted");
        assert_eq!(err.code(), "NoSuchKey");
        assert_eq!(err.status_code(), 404);
        assert!(bucket.list_objects("", "", "", 1000).objects.is_empty());
        assert_eq!(bucket.objects().total_size(), 0);

        let err = bucket
            .get_object("a.txt", Some(&marker))
            .expect_err("marker");
        assert!(matches!(err, S3ServiceError::MethodNotAllowed));

        bucket.delete_object("a.txt", Some(&marker));
        let restored = bucket.get_object("a.txt", None).expect("restored");
        assert_eq!(read_body(&restored).expect("read"), b"data");
        assert_eq!(bucket.objects().total_size(), 4);
    }

    #[test]
    fn test_should_drop_key_when_last_version_removed() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "verdrop");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");
        let only = put_bytes(&bucket, "k", b"x").expect("put");

        let id = only.version_id.clone().expect("id");
        let outcome = bucket.delete_object("k", Some(&id));
        assert!(!outcome.delete_marker);
        assert!(bucket.is_empty());
        assert!(matches!(
            bucket.get_object("k", Some(&id)),
            Err(S3ServiceError::NoSuchVersion { .. })
        ));
    }

    #[test]
    fn test_should_overwrite_null_version_when_suspended() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "versusp");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");
        let kept = put_bytes(&bucket, "k", b"kept").expect("put");
        bucket
            .set_versioning(VersioningStatus::Suspended)
            .expect("suspend versioning");

        put_bytes(&bucket, "k", b"first-null").expect("put");
        put_bytes(&bucket, "k", b"second-null").expect("put");

        let chain = bucket.objects().get_all_versions("k").expect("chain");
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].version_id(), Some(NULL_VERSION_ID));
        let null = bucket
            .get_object("k", Some(NULL_VERSION_ID))
            .expect("null version");
        assert_eq!(read_body(&null).expect("read"), b"second-null");
        let kept_id = kept.version_id.clone().expect("id");
        assert!(bucket.get_object("k", Some(&kept_id)).is_ok());
    }

    #[test]
    fn test_should_replace_unversioned_object_when_suspended() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "vernull");
        put_bytes(&bucket, "k", b"unset-era").expect("put");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");
        put_bytes(&bucket, "k", b"enabled-era").expect("put");
        bucket
            .set_versioning(VersioningStatus::Suspended)
            .expect("suspend versioning");
        put_bytes(&bucket, "k", b"suspended-era-newest").expect("put");

        let chain = bucket.objects().get_all_versions("k").expect("chain");
        let nulls = chain
            .iter()
            .filter(|v| v.version_id().unwrap_or(NULL_VERSION_ID) == NULL_VERSION_ID)
            .count();
        assert_eq!(nulls, 1);
        assert_eq!(chain.len(), 2);

        let null = bucket
            .get_object("k", Some(NULL_VERSION_ID))
            .expect("null version");
        assert_eq!(read_body(&null).expect("read"), b"suspended-era-newest");

        bucket.delete_object("k", Some(NULL_VERSION_ID));
        assert!(bucket.get_object("k", Some(NULL_VERSION_ID)).is_err());
        let current = bucket.get_object("k", None).expect("current");
        assert_eq!(read_body(&current).expect("read"), b"enabled-era");
    }

    #[test]
    fn test_should_keep_one_current_version_under_concurrent_puts() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "verconc");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");

        std::thread::scope(|s| {
            for t in 0..8u8 {
                let bucket = &bucket;
                s.spawn(move || {
                    for _ in 0..10 {
                        put_bytes(bucket, "hot", &[t; 100]).expect("put");
                    }
                });
            }
        });

        let chain = bucket.objects().get_all_versions("hot").expect("chain");
        assert_eq!(chain.len(), 80);
        let current: Vec<_> = chain
            .iter()
            .filter_map(|v| v.as_object())
            .filter(|o| o.is_current())
            .collect();
        assert_eq!(current.len(), 1);
        assert!(chain.last().and_then(|v| v.as_object()).is_some_and(|o| o.is_current()));
        assert_eq!(bucket.objects().total_size(), 100);
    }
}
