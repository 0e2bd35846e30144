//! objstore CLI - drive the object storage engine from the shell.
//!
//! Every file given on the command line is ingested into one bucket of an
//! in-process engine, keyed by its file name. Afterwards the version chain
//! and the response headers of every key are printed as JSON. Passing the
//! same file twice with `--versioning enabled` shows version chains at work.
//!
//! # Usage
//!
//! ```text
//! objstore --checksum SHA256 --chunked --versioning enabled a.bin a.bin
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DEFAULT_ACCOUNT_ID` | `000000000000` | Account owning the bucket |
//! | `DEFAULT_REGION` | `us-east-1` | Region of the bucket |
//! | `S3_MAX_MEMORY_OBJECT_SIZE` | `524288` | Spill threshold of object values |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, ValueEnum};
use objstore_core::ObjStoreConfig;
use objstore_s3::checksums::{ChecksumAlgorithm, compute_checksum};
use objstore_s3::read::{BodyIterator, RangeBodyIterator};
use objstore_s3::state::{ObjectParams, S3Bucket, VersioningStatus};
use objstore_s3::utils::parse_range_header;
use objstore_s3::{IngestSource, S3Config, S3ServiceResult, S3ServiceState};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Chunk size used when re-encoding a file as `aws-chunked`.
const ENCODE_CHUNK_SIZE: usize = 8_192;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Versioning {
    Unset,
    Enabled,
    Suspended,
}

/// Ingest local files into an in-process objstore bucket.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to ingest; the file name becomes the key
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Bucket name
    #[arg(long, default_value = "objstore-cli")]
    bucket: String,

    /// Integrity checksum algorithm (CRC32, CRC32C, SHA1, SHA256)
    #[arg(long)]
    checksum: Option<ChecksumAlgorithm>,

    /// Send each file as an aws-chunked body with a trailing checksum
    #[arg(long)]
    chunked: bool,

    /// Versioning status of the bucket
    #[arg(long, value_enum, default_value = "unset")]
    versioning: Versioning,

    /// Range header to read back from each current object (e.g. `bytes=0-99`)
    #[arg(long)]
    range: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyReport {
    key: String,
    versions: Vec<VersionReport>,
    headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    bytes_read: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VersionReport {
    version_id: Option<String>,
    delete_marker: bool,
    size: Option<u64>,
    is_current: bool,
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Encode `data` as an `aws-chunked` body, with the checksum as a trailer.
fn encode_chunked(data: &[u8], checksum: Option<ChecksumAlgorithm>) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + data.len() / ENCODE_CHUNK_SIZE * 16 + 64);
    for chunk in data.chunks(ENCODE_CHUNK_SIZE) {
        body.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        body.extend_from_slice(chunk);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(b"0\r\n");
    if let Some(alg) = checksum {
        let trailer = format!("{}:{}\r\n", alg.header_name(), compute_checksum(alg, data));
        body.extend_from_slice(trailer.as_bytes());
    }
    body.extend_from_slice(b"\r\n");
    body
}

fn key_for(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .with_context(|| format!("no usable file name in {}", path.display()))
}

fn ingest_file(bucket: &S3Bucket, path: &Path, args: &Args) -> Result<()> {
    let key = key_for(path)?;
    let mut params = ObjectParams::builder().key(key.clone()).build();
    params.checksum_algorithm = args.checksum;

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let object = if args.chunked {
        let mut data = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let body = encode_chunked(&data, args.checksum);
        let mut reader = body.as_slice();
        bucket.put_object(
            params,
            IngestSource::Chunked {
                reader: &mut reader,
                decoded_content_length: data.len() as u64,
            },
        )?
    } else {
        let mut reader = BufReader::new(file);
        bucket.put_object(params, IngestSource::Stream(&mut reader))?
    };

    info!(key, version_id = ?object.version_id, size = object.size(), "ingested file");
    Ok(())
}

fn count_bytes(blocks: impl Iterator<Item = S3ServiceResult<Bytes>>) -> Result<u64> {
    let mut total = 0;
    for block in blocks {
        total += block?.len() as u64;
    }
    Ok(total)
}

fn report(bucket: &S3Bucket, key: &str, range: Option<&str>) -> Result<KeyReport> {
    let versions = bucket
        .objects()
        .get_all_versions(key)
        .unwrap_or_default()
        .iter()
        .map(|v| VersionReport {
            version_id: v.version_id().map(str::to_owned),
            delete_marker: v.is_delete_marker(),
            size: v.size(),
            is_current: v.as_object().is_some_and(|o| o.is_current()),
        })
        .collect();

    let object = bucket.get_object(key, None)?;
    let bytes_read = match range {
        Some(range) => {
            let parsed = parse_range_header(range, object.size())?;
            count_bytes(RangeBodyIterator::new(Arc::clone(&object), parsed))?
        }
        None => count_bytes(BodyIterator::new(Arc::clone(&object)))?,
    };

    Ok(KeyReport {
        key: key.to_owned(),
        versions,
        headers: object.metadata_headers(),
        checksum: object.checksum_value(),
        bytes_read,
    })
}

fn main() -> Result<()> {
    let args = Args::parse();
    let core_config = ObjStoreConfig::from_env();
    let log_level = args.log_level.as_deref().unwrap_or(&core_config.log_level);
    init_tracing(log_level)?;

    let state = S3ServiceState::new(S3Config::from_env());
    let bucket = state.create_bucket(
        &args.bucket,
        &core_config.default_account_id,
        &core_config.default_region,
        false,
    )?;
    match args.versioning {
        Versioning::Unset => {}
        Versioning::Enabled => bucket.set_versioning(VersioningStatus::Enabled)?,
        Versioning::Suspended => bucket.set_versioning(VersioningStatus::Suspended)?,
    }

    for path in &args.files {
        ingest_file(&bucket, path, &args)?;
    }

    let reports = bucket
        .objects()
        .keys()
        .iter()
        .map(|key| report(&bucket, key, args.range.as_deref()))
        .collect::<Result<Vec<_>>>()?;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
