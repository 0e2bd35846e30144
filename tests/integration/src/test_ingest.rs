//! Ingestion and read-back integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use objstore_s3::checksums::{ChecksumAlgorithm, compute_checksum, compute_md5};
    use objstore_s3::read::RangeBodyIterator;
    use objstore_s3::state::{ObjectMetadata, ObjectParams, VersioningStatus};
    use objstore_s3::utils::parse_range_header;
    use objstore_s3::{IngestSource, S3ServiceError};

    use crate::{
        chunked_body, create_test_bucket, params, payload, put_bytes, read_body, test_state,
    };

    #[test]
    fn test_should_spill_large_body_and_read_it_back() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "spill");
        let data = payload(200_000);

        let object = put_bytes(&bucket, "big.bin", &data).expect("put");
        assert_eq!(object.size(), data.len() as u64);
        assert_eq!(object.etag(), compute_md5(&data));
        assert_eq!(read_body(&object).expect("read"), data);
    }

    #[test]
    fn test_should_store_same_etag_for_chunked_and_plain_bodies() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "chunked");
        let data = payload(70_000);
        let checksum = compute_checksum(ChecksumAlgorithm::Sha256, &data);

        let plain = put_bytes(&bucket, "plain", &data).expect("plain");

        let body = chunked_body(&data, 8_192, &[("x-amz-checksum-sha256", &checksum)]);
        let mut reader = body.as_slice();
        let chunked = bucket
            .put_object(
                params("chunked", Some(ChecksumAlgorithm::Sha256)),
                IngestSource::Chunked {
                    reader: &mut reader,
                    decoded_content_length: data.len() as u64,
                },
            )
            .expect("chunked");

        assert_eq!(plain.etag(), chunked.etag());
        assert_eq!(chunked.checksum_value(), Some(checksum));
        assert_eq!(read_body(&chunked).expect("read"), data);
    }

    #[test]
    fn test_should_reject_bad_trailer_checksum_without_storing() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "badsum");
        let data = payload(3_000);

        let body = chunked_body(&data, 1_000, &[("x-amz-checksum-crc32", "AAAAAA==")]);
        let mut reader = body.as_slice();
        let err = bucket
            .put_object(
                params("k", Some(ChecksumAlgorithm::Crc32)),
                IngestSource::Chunked {
                    reader: &mut reader,
                    decoded_content_length: data.len() as u64,
                },
            )
            .expect_err("mismatch");

        assert!(matches!(err, S3ServiceError::ChecksumMismatch { .. }));
        assert_eq!(err.code(), "BadDigest");
        assert_eq!(
            err.to_string(),
            "Value for x-amz-checksum-crc32 header is invalid."
        );
        assert!(bucket.is_empty());
    }

    #[test]
    fn test_should_reject_truncated_chunked_body() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "trunc");
        let data = payload(100);

        let body = chunked_body(&data, 40, &[]);
        let mut reader = &body[..50];
        let err = bucket
            .put_object(
                params("k", None),
                IngestSource::Chunked {
                    reader: &mut reader,
                    decoded_content_length: data.len() as u64,
                },
            )
            .expect_err("truncated");

        assert!(matches!(err, S3ServiceError::TruncatedBody { expected: 100, .. }));
        assert!(bucket.get_object("k", None).is_err());
    }

    #[test]
    fn test_should_validate_declared_header_checksum() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "declared");

        let mut good = params("good", Some(ChecksumAlgorithm::Crc32));
        good.checksum_value = Some("NhCmhg==".to_owned());
        let mut body: &[u8] = b"hello";
        let object = bucket
            .put_object(good, IngestSource::Stream(&mut body))
            .expect("good");
        assert_eq!(object.checksum_value().as_deref(), Some("NhCmhg=="));

        let mut bad = params("bad", Some(ChecksumAlgorithm::Crc32));
        bad.checksum_value = Some("NhCmhh==".to_owned());
        let mut body: &[u8] = b"hello";
        assert!(bucket.put_object(bad, IngestSource::Stream(&mut body)).is_err());
        assert!(bucket.get_object("bad", None).is_err());
    }

    #[test]
    fn test_should_leave_version_chain_untouched_on_checksum_mismatch() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "sumchain");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");

        for algorithm in [
            ChecksumAlgorithm::Crc32,
            ChecksumAlgorithm::Crc32c,
            ChecksumAlgorithm::Sha1,
            ChecksumAlgorithm::Sha256,
        ] {
            let key = format!("k-{algorithm}");
            let mut good = params(&key, Some(algorithm));
            good.checksum_value = Some(compute_checksum(algorithm, b"good body"));
            let mut body: &[u8] = b"good body";
            bucket
                .put_object(good, IngestSource::Stream(&mut body))
                .expect("good put");
            let before = bucket.objects().get_all_versions(&key).map(|c| c.len());

            let mut bad = params(&key, Some(algorithm));
            bad.checksum_value = Some(compute_checksum(algorithm, b"other body"));
            let mut body: &[u8] = b"tampered body";
            let err = bucket
                .put_object(bad, IngestSource::Stream(&mut body))
                .expect_err("mismatch");

            assert!(
                matches!(err, S3ServiceError::ChecksumMismatch { algorithm: a } if a == algorithm),
                "{algorithm}"
            );
            assert_eq!(
                bucket.objects().get_all_versions(&key).map(|c| c.len()),
                before,
                "{algorithm}"
            );
            let current = bucket.get_object(&key, None).expect("current");
            assert_eq!(read_body(&current).expect("read"), b"good body");
        }
    }

    #[test]
    fn test_should_read_byte_ranges() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "range");
        let data = payload(150_000);
        let object = put_bytes(&bucket, "k", &data).expect("put");

        for (header, expected) in [
            ("bytes=100-199", &data[100..200]),
            ("bytes=149990-", &data[149_990..]),
            ("bytes=-5", &data[149_995..]),
            ("bytes=65530-131080", &data[65_530..=131_080]),
        ] {
            let range = parse_range_header(header, object.size()).expect("range");
            let mut out = Vec::new();
            for block in RangeBodyIterator::new(Arc::clone(&object), range) {
                out.extend_from_slice(&block.expect("block"));
            }
            assert_eq!(out, expected, "range {header}");
        }

        assert!(matches!(
            parse_range_header("bytes=200000-", object.size()),
            Err(S3ServiceError::InvalidRange)
        ));
    }

    #[test]
    fn test_should_report_metadata_headers_in_order() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "headers");
        let params = ObjectParams::builder()
            .key("doc.txt".to_owned())
            .metadata(ObjectMetadata::from_headers([
                ("Content-Type", "text/plain"),
                ("X-Amz-Meta-Owner", "alice"),
            ]))
            .build();
        let mut body: &[u8] = b"hello";
        let object = bucket
            .put_object(params, IngestSource::Stream(&mut body))
            .expect("put");

        let names: Vec<_> = object
            .metadata_headers()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "Last-Modified",
                "Content-Length",
                "ETag",
                "Content-Type",
                "x-amz-meta-owner"
            ]
        );
        assert!(
            object
                .metadata_headers()
                .contains(&("ETag".to_owned(), "\"5d41402abc4b2a76b9719d911017c592\"".to_owned()))
        );
    }

    #[test]
    fn test_should_keep_serving_old_object_while_key_is_overwritten() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "concurrent");
        let original = payload(50_000);
        let object = put_bytes(&bucket, "k", &original).expect("put");

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..5 {
                        assert_eq!(read_body(&object).expect("read"), original);
                    }
                });
            }
            s.spawn(|| {
                for i in 0..5u8 {
                    put_bytes(&bucket, "k", &[i; 4_000]).expect("overwrite");
                }
            });
        });

        let current = bucket.get_object("k", None).expect("current");
        assert_eq!(current.size(), 4_000);
        assert!(!object.is_current());
    }
}
