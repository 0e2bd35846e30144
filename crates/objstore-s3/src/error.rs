//! S3-specific error types.
//!
//! Defines [`S3ServiceError`], the error enum returned by every fallible
//! engine operation. Each variant carries the S3 wire error code and HTTP
//! status the request layer needs to render it.
//!
//! # Usage
//!
//! ```
//! use http::StatusCode;
//! use objstore_s3::error::S3ServiceError;
//!
//! let err = S3ServiceError::NoSuchBucket {
//!     bucket: "my-bucket".to_owned(),
//! };
//! assert_eq!(err.code(), "NoSuchBucket");
//! assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
//! ```

use http::StatusCode;

use crate::checksums::ChecksumAlgorithm;

/// S3 service error type.
#[derive(Debug, thiserror::Error)]
pub enum S3ServiceError {
    // -----------------------------------------------------------------------
    // Ingestion errors
    // -----------------------------------------------------------------------
    /// The checksum supplied by the client does not match the body.
    #[error("Value for x-amz-checksum-{} header is invalid.", algorithm.as_str().to_ascii_lowercase())]
    ChecksumMismatch {
        /// Algorithm whose digest disagreed.
        algorithm: ChecksumAlgorithm,
    },

    /// The checksum algorithm is missing or not one the engine supports.
    #[error("Checksum algorithm is not supported: {algorithm}")]
    UnsupportedChecksum {
        /// The algorithm name as supplied, empty when none was given.
        algorithm: String,
    },

    /// A chunk-size line of an `aws-chunked` body is not hexadecimal.
    #[error("Invalid chunk size line in aws-chunked body: {line:?}")]
    MalformedChunkedBody {
        /// The offending line with line terminators stripped.
        line: String,
    },

    /// The body ended before the declared decoded length was reached.
    #[error("Request body ended after {received} of {expected} bytes")]
    TruncatedBody {
        /// Declared decoded length.
        expected: u64,
        /// Bytes actually decoded.
        received: u64,
    },

    // -----------------------------------------------------------------------
    // Bucket errors
    // -----------------------------------------------------------------------
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The requested bucket name is not available (owned by another account).
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket already exists and is owned by you.
    #[error(
        "Your previous request to create the named bucket succeeded and you already own it: {bucket}"
    )]
    BucketAlreadyOwnedByYou {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket has no CORS configuration.
    #[error("The CORS configuration does not exist")]
    NoSuchCorsConfiguration,

    // -----------------------------------------------------------------------
    // Object / key errors
    // -----------------------------------------------------------------------
    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified version does not exist.
    #[error("The specified version does not exist: key={key}, version_id={version_id}")]
    NoSuchVersion {
        /// The key for the version.
        key: String,
        /// The version ID that was not found.
        version_id: String,
    },

    /// The requested range is not satisfiable.
    #[error("The requested range is not satisfiable")]
    InvalidRange,

    /// The HTTP method is not allowed against this resource.
    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // -----------------------------------------------------------------------
    // Multipart upload errors
    // -----------------------------------------------------------------------
    /// The specified multipart upload does not exist.
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// The list of parts was not in ascending order.
    #[error("The list of parts was not in ascending order")]
    InvalidPartOrder,

    /// One or more of the specified parts could not be found.
    #[error("One or more of the specified parts could not be found")]
    InvalidPart,

    /// A proposed upload part is smaller than the minimum allowed size.
    #[error("Your proposed upload is smaller than the minimum allowed object size")]
    EntityTooSmall,

    // -----------------------------------------------------------------------
    // Internal / catch-all
    // -----------------------------------------------------------------------
    /// Backing storage failure with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl S3ServiceError {
    /// The S3 error code string rendered in the response body.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ChecksumMismatch { .. } => "BadDigest",
            Self::UnsupportedChecksum { .. } | Self::MalformedChunkedBody { .. } => {
                "InvalidRequest"
            }
            Self::TruncatedBody { .. } => "IncompleteBody",
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::BucketAlreadyExists { .. } => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou { .. } => "BucketAlreadyOwnedByYou",
            Self::NoSuchCorsConfiguration => "NoSuchCORSConfiguration",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchVersion { .. } => "NoSuchVersion",
            Self::InvalidRange => "InvalidRange",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidPart => "InvalidPart",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::Internal(_) => "InternalError",
        }
    }

    /// The HTTP status the request layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoSuchBucket { .. }
            | Self::NoSuchCorsConfiguration
            | Self::NoSuchKey { .. }
            | Self::NoSuchVersion { .. }
            | Self::NoSuchUpload { .. } => StatusCode::NOT_FOUND,
            Self::BucketAlreadyExists { .. } | Self::BucketAlreadyOwnedByYou { .. } => {
                StatusCode::CONFLICT
            }
            Self::InvalidRange => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ChecksumMismatch { .. }
            | Self::UnsupportedChecksum { .. }
            | Self::MalformedChunkedBody { .. }
            | Self::TruncatedBody { .. }
            | Self::InvalidArgument { .. }
            | Self::InvalidPartOrder
            | Self::InvalidPart
            | Self::EntityTooSmall => StatusCode::BAD_REQUEST,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Only backing-storage failures qualify; every client error is final.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

/// Convenience result type for S3 service operations.
pub type S3ServiceResult<T> = Result<T, S3ServiceError>;
