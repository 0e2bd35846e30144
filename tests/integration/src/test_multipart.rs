//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use objstore_s3::checksums::{
        ChecksumAlgorithm, compute_checksum, compute_composite_checksum, compute_md5,
        compute_multipart_etag,
    };
    use objstore_s3::state::VersioningStatus;
    use objstore_s3::{IngestSource, S3ServiceError};

    use crate::{chunked_body, create_test_bucket, params, payload, read_body, test_state};

    #[test]
    fn test_should_complete_multipart_upload() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpu");
        let upload = bucket.create_multipart_upload(params("assembled.bin", None));

        let chunks = [payload(900), payload(1_500), payload(7)];
        let mut requested = Vec::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let number = u32::try_from(i + 1).expect("part number");
            let mut reader = chunk.as_slice();
            let part = bucket
                .upload_part(&upload.upload_id, number, IngestSource::Stream(&mut reader), None)
                .expect("upload part");
            assert_eq!(part.etag(), compute_md5(chunk));
            requested.push((number, format!("\"{}\"", part.etag())));
        }
        assert_eq!(bucket.list_parts(&upload.upload_id).expect("parts").len(), 3);

        let object = bucket
            .complete_multipart_upload(&upload.upload_id, &requested)
            .expect("complete");

        let expected: Vec<u8> = chunks.concat();
        assert_eq!(read_body(&object).expect("read"), expected);
        assert_eq!(object.size(), expected.len() as u64);
        assert_eq!(
            object.etag(),
            compute_multipart_etag(&chunks.iter().map(|c| compute_md5(c)).collect::<Vec<_>>())
        );
        assert!(object.etag().ends_with("-3"));
        assert_eq!(object.parts.as_ref().map(Vec::len), Some(3));
        assert!(bucket.list_multipart_uploads().is_empty());
        assert!(matches!(
            bucket.list_parts(&upload.upload_id),
            Err(S3ServiceError::NoSuchUpload { .. })
        ));
    }

    #[test]
    fn test_should_accept_chunked_parts() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpuchunk");
        let upload = bucket.create_multipart_upload(params("k", None));

        let data = payload(40);
        let body = chunked_body(&data, 16, &[]);
        let mut reader = body.as_slice();
        let part = bucket
            .upload_part(
                &upload.upload_id,
                1,
                IngestSource::Chunked {
                    reader: &mut reader,
                    decoded_content_length: data.len() as u64,
                },
                None,
            )
            .expect("part");
        assert_eq!(part.etag(), compute_md5(&data));
        assert_eq!(part.size(), 40);
    }

    #[test]
    fn test_should_reject_too_small_part() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpusmall");
        let upload = bucket.create_multipart_upload(params("k", None));

        let mut requested = Vec::new();
        for (number, body) in [(1, &b"tiny"[..]), (2, &b"last"[..])] {
            let mut reader = body;
            let part = bucket
                .upload_part(&upload.upload_id, number, IngestSource::Stream(&mut reader), None)
                .expect("part");
            requested.push((number, part.etag()));
        }

        let err = bucket
            .complete_multipart_upload(&upload.upload_id, &requested)
            .expect_err("too small");
        assert!(matches!(err, S3ServiceError::EntityTooSmall));
        assert_eq!(err.code(), "EntityTooSmall");
        assert!(bucket.get_object("k", None).is_err());
        assert_eq!(bucket.list_multipart_uploads().len(), 1);
    }

    #[test]
    fn test_should_compute_composite_checksum_for_upload() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpusum");
        let upload =
            bucket.create_multipart_upload(params("k", Some(ChecksumAlgorithm::Crc32c)));

        let first = payload(32);
        let second = payload(3);
        let mut requested = Vec::new();
        for (number, body) in [(1, &first), (2, &second)] {
            let declared = compute_checksum(ChecksumAlgorithm::Crc32c, body);
            let mut reader = body.as_slice();
            let part = bucket
                .upload_part(
                    &upload.upload_id,
                    number,
                    IngestSource::Stream(&mut reader),
                    Some(&declared),
                )
                .expect("part");
            requested.push((number, part.etag()));
        }

        let object = bucket
            .complete_multipart_upload(&upload.upload_id, &requested)
            .expect("complete");
        assert_eq!(
            object.checksum_value(),
            Some(compute_composite_checksum(
                ChecksumAlgorithm::Crc32c,
                &[
                    compute_checksum(ChecksumAlgorithm::Crc32c, &first),
                    compute_checksum(ChecksumAlgorithm::Crc32c, &second),
                ],
            ))
        );
    }

    #[test]
    fn test_should_version_completed_upload() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpuver");
        bucket
            .set_versioning(VersioningStatus::Enabled)
            .expect("enable versioning");

        let upload = bucket.create_multipart_upload(params("k", None));
        let mut reader: &[u8] = b"only part";
        let part = bucket
            .upload_part(&upload.upload_id, 1, IngestSource::Stream(&mut reader), None)
            .expect("part");
        let object = bucket
            .complete_multipart_upload(&upload.upload_id, &[(1, part.etag())])
            .expect("complete");

        assert!(object.version_id.is_some());
        assert!(object.is_current());
    }

    #[test]
    fn test_should_abort_upload() {
        let state = test_state();
        let bucket = create_test_bucket(&state, "mpuabort");
        let upload = bucket.create_multipart_upload(params("k", None));

        bucket
            .abort_multipart_upload(&upload.upload_id)
            .expect("abort");
        let mut reader: &[u8] = b"late";
        assert!(matches!(
            bucket.upload_part(&upload.upload_id, 1, IngestSource::Stream(&mut reader), None),
            Err(S3ServiceError::NoSuchUpload { .. })
        ));
    }
}
